//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Subscription tiers, ordered from the most to the least restricted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "subscription_plan", rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Free,
    Starter,
    Pro,
}

impl SubscriptionPlan {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "FREE",
            SubscriptionPlan::Starter => "STARTER",
            SubscriptionPlan::Pro => "PRO",
        }
    }
}

impl fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "menu_status", rename_all = "snake_case")]
pub enum MenuStatus {
    Draft,
    Published,
}

impl MenuStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MenuStatus::Draft => "DRAFT",
            MenuStatus::Published => "PUBLISHED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "device_type", rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

/// Output encodings supported by the QR endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrFormat {
    #[default]
    Png,
    Svg,
}

impl QrFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            QrFormat::Png => "image/png",
            QrFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            QrFormat::Png => "png",
            QrFormat::Svg => "svg",
        }
    }
}

impl FromStr for QrFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(QrFormat::Png),
            "svg" => Ok(QrFormat::Svg),
            other => Err(format!("unsupported format `{other}`; expected png or svg")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl QrSize {
    /// Minimum edge length of the rendered code in pixels.
    pub fn pixels(self) -> u32 {
        match self {
            QrSize::Small => 200,
            QrSize::Medium => 400,
            QrSize::Large => 800,
        }
    }
}

impl FromStr for QrSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(QrSize::Small),
            "medium" => Ok(QrSize::Medium),
            "large" => Ok(QrSize::Large),
            other => Err(format!(
                "unsupported size `{other}`; expected small, medium or large"
            )),
        }
    }
}
