//! Request payloads. Shape checks live here; business rules stay in the
//! services.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::application::auth::AuthSession;
use crate::application::catalog::{
    CategoryInput, CategoryPatch, ProductInput, ProductPatch, VariationInput,
};
use crate::application::menus::{CreateMenuCommand, StylingInput, UpdateMenuCommand};
use crate::application::promotions::PromotionInput;
use crate::application::repos::SortUpdate;
use crate::domain::entities::UserRecord;
use crate::domain::localized::LocalizedText;

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex"));

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: UserRecord,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            expires_at: session.expires_at,
            user: session.user,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StylingRequest {
    #[validate(length(min = 1, max = 40))]
    pub theme: Option<String>,
    #[validate(regex(path = *HEX_COLOR, message = "must be a hex color such as #1a2b3c"))]
    pub primary_color: Option<String>,
    #[validate(regex(path = *HEX_COLOR, message = "must be a hex color such as #1a2b3c"))]
    pub accent_color: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub font_family: Option<String>,
    #[validate(url(message = "must be an absolute URL"))]
    pub logo_url: Option<String>,
    #[validate(url(message = "must be an absolute URL"))]
    pub cover_url: Option<String>,
}

impl From<StylingRequest> for StylingInput {
    fn from(request: StylingRequest) -> Self {
        Self {
            theme: request.theme,
            primary_color: request.primary_color,
            accent_color: request.accent_color,
            font_family: request.font_family,
            logo_url: request.logo_url,
            cover_url: request.cover_url,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: String,
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub styling: StylingRequest,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: Option<String>,
    #[validate(length(min = 2, max = 10))]
    pub default_locale: Option<String>,
}

impl From<CreateMenuRequest> for CreateMenuCommand {
    fn from(request: CreateMenuRequest) -> Self {
        Self {
            name: request.name,
            slug: request.slug,
            description: request.description,
            styling: request.styling.into(),
            currency: request.currency,
            default_locale: request.default_locale,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenuRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1 to 100 characters"))]
    pub name: Option<String>,
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub styling: StylingRequest,
    #[validate(length(equal = 3, message = "must be an ISO 4217 code"))]
    pub currency: Option<String>,
    #[validate(length(min = 2, max = 10))]
    pub default_locale: Option<String>,
}

impl From<UpdateMenuRequest> for UpdateMenuCommand {
    fn from(request: UpdateMenuRequest) -> Self {
        Self {
            name: request.name,
            slug: request.slug,
            description: request.description,
            styling: request.styling.into(),
            currency: request.currency,
            default_locale: request.default_locale,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PublishRequest {
    pub publish: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
}

impl From<CategoryRequest> for CategoryInput {
    fn from(request: CategoryRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatchRequest {
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
}

impl From<CategoryPatchRequest> for CategoryPatch {
    fn from(request: CategoryPatchRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub price: i64,
    #[validate(url(message = "must be an absolute URL"))]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl From<ProductRequest> for ProductInput {
    fn from(request: ProductRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            price: request.price,
            image_url: request.image_url,
            is_available: request.is_available,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_patch_image_url"))]
pub struct ProductPatchRequest {
    pub category_id: Option<Uuid>,
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub price: Option<i64>,
    /// Absent keeps the image; `null` or `""` removes it.
    #[serde(default, deserialize_with = "present_or_null")]
    pub image_url: Option<Option<String>>,
    pub is_available: Option<bool>,
}

impl From<ProductPatchRequest> for ProductPatch {
    fn from(request: ProductPatchRequest) -> Self {
        Self {
            category_id: request.category_id,
            name: request.name,
            description: request.description,
            price: request.price,
            image_url: request
                .image_url
                .map(|url| url.filter(|url| !url.trim().is_empty())),
            is_available: request.is_available,
        }
    }
}

/// Distinguish an explicit `null` from an absent field.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_patch_image_url(request: &ProductPatchRequest) -> Result<(), ValidationError> {
    let Some(Some(url)) = request.image_url.as_ref() else {
        return Ok(());
    };
    if url.trim().is_empty() {
        return Ok(());
    }
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("url").with_message("imageUrl must be an absolute URL".into())),
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariationRequest {
    pub name: LocalizedText,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub price: Option<i64>,
}

impl From<VariationRequest> for VariationInput {
    fn from(request: VariationRequest) -> Self {
        Self {
            name: request.name,
            price: request.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SortItem {
    pub id: Uuid,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub sort_order: i32,
}

fn into_updates(items: Vec<SortItem>) -> Vec<SortUpdate> {
    items
        .into_iter()
        .map(|item| SortUpdate {
            id: item.id,
            sort_order: item.sort_order,
        })
        .collect()
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderCategoriesRequest {
    #[validate(length(min = 1), nested)]
    pub categories: Vec<SortItem>,
}

impl ReorderCategoriesRequest {
    pub fn into_updates(self) -> Vec<SortUpdate> {
        into_updates(self.categories)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderProductsRequest {
    #[validate(length(min = 1), nested)]
    pub products: Vec<SortItem>,
}

impl ReorderProductsRequest {
    pub fn into_updates(self) -> Vec<SortUpdate> {
        into_updates(self.products)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderVariationsRequest {
    #[validate(length(min = 1), nested)]
    pub variations: Vec<SortItem>,
}

impl ReorderVariationsRequest {
    pub fn into_updates(self) -> Vec<SortUpdate> {
        into_updates(self.variations)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    pub title: LocalizedText,
    pub description: Option<LocalizedText>,
    #[validate(url(message = "must be an absolute URL"))]
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl From<PromotionRequest> for PromotionInput {
    fn from(request: PromotionRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            image_url: request.image_url,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            is_active: request.is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QrQuery {
    pub format: Option<String>,
    pub size: Option<String>,
    pub download: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedResponse {
    pub tracked: bool,
    pub view_id: Uuid,
}
