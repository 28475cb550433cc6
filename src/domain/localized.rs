//! Per-locale text values stored as JSON objects (`{"en": "Soups", "fr": "Soupes"}`).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

static LOCALE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2}(-[A-Z]{2})?$")
        .expect("valid locale regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    pub fn single(locale: &str, text: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(locale.to_string(), text.into());
        Self(values)
    }

    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0.get(locale).map(String::as_str)
    }

    /// Text for `locale`, falling back to `default_locale` and then to any value.
    pub fn resolve(&self, locale: &str, default_locale: &str) -> Option<&str> {
        self.get(locale)
            .or_else(|| self.get(default_locale))
            .or_else(|| self.0.values().next().map(String::as_str))
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check locale tags and lengths, trimming every value in place.
    pub fn normalize(mut self, field: &str, max_chars: usize) -> Result<Self, DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::validation(format!(
                "{field} needs at least one locale"
            )));
        }
        for (locale, value) in self.0.iter_mut() {
            if !LOCALE_TAG.is_match(locale) {
                return Err(DomainError::validation(format!(
                    "{field} has an invalid locale tag `{locale}`"
                )));
            }
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(DomainError::validation(format!(
                    "{field}.{locale} must not be blank"
                )));
            }
            if trimmed.chars().count() > max_chars {
                return Err(DomainError::validation(format!(
                    "{field}.{locale} exceeds {max_chars} characters"
                )));
            }
            *value = trimmed.to_string();
        }
        Ok(self)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for LocalizedText {
    fn from(entries: [(&str, &str); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(locale, text)| (locale.to_string(), text.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_default_locale() {
        let text = LocalizedText::from([("en", "Soups"), ("fr", "Soupes")]);
        assert_eq!(text.resolve("fr", "en"), Some("Soupes"));
        assert_eq!(text.resolve("de", "en"), Some("Soups"));
    }

    #[test]
    fn normalize_trims_and_validates() {
        let text = LocalizedText::from([("en", "  Soups ")])
            .normalize("name", 10)
            .expect("valid text");
        assert_eq!(text.get("en"), Some("Soups"));

        assert!(LocalizedText::default().normalize("name", 10).is_err());
        assert!(
            LocalizedText::from([("english", "Soups")])
                .normalize("name", 10)
                .is_err()
        );
        assert!(
            LocalizedText::from([("en", "   ")])
                .normalize("name", 10)
                .is_err()
        );
        assert!(
            LocalizedText::from([("en", "A very long category name")])
                .normalize("name", 10)
                .is_err()
        );
    }

    #[test]
    fn serializes_as_plain_object() {
        let text = LocalizedText::from([("en", "Tea")]);
        assert_eq!(
            serde_json::to_value(&text).expect("serialize"),
            serde_json::json!({"en": "Tea"})
        );
    }
}
