//! Menu slug rules.
//!
//! Slugs are the public lookup key of a menu (`/m/{slug}`), so they must stay
//! URL-safe and stable. Explicit slugs are validated as given; when the owner
//! omits one it is derived from the menu name and suffixed until unique.

use std::future::Future;

use once_cell::sync::Lazy;
use regex::Regex;
use slug::slugify;
use thiserror::Error;

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 60;
const MAX_SUFFIX_ATTEMPTS: usize = 32;

static SLUG_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug must be between {MIN_SLUG_LEN} and {MAX_SLUG_LEN} characters")]
    Length,
    #[error("slug may only contain lowercase letters, digits and single hyphens")]
    Shape,
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Check an owner-supplied slug.
pub fn validate_slug(candidate: &str) -> Result<(), SlugError> {
    let len = candidate.len();
    if !(MIN_SLUG_LEN..=MAX_SLUG_LEN).contains(&len) {
        return Err(SlugError::Length);
    }
    if !SLUG_SHAPE.is_match(candidate) {
        return Err(SlugError::Shape);
    }
    Ok(())
}

/// Derive a base slug from a menu name, padded or truncated to fit the length rules.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    // leave room for a uniqueness suffix
    let budget = MAX_SLUG_LEN - 4;
    if candidate.len() > budget {
        candidate.truncate(budget);
        while candidate.ends_with('-') {
            candidate.pop();
        }
    }
    if candidate.len() < MIN_SLUG_LEN {
        candidate.push_str("-menu");
    }

    Ok(candidate)
}

/// Produce a slug that does not collide according to the async predicate.
///
/// `is_available` returns `true` when nothing else uses the candidate. Retries
/// append a counter (`-2`, `-3`, …).
pub async fn generate_unique_slug<F, Fut, E>(
    input: &str,
    mut is_available: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_available(base.clone())
        .await
        .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_available(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}
