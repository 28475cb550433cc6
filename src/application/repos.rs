//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{
    CategoryRecord, MenuDetail, MenuRecord, MenuStyling, MenuViewRecord, ProductRecord,
    PromotionRecord, UserCredentials, UserRecord, VariationRecord,
};
use crate::domain::localized::LocalizedText;
use crate::domain::types::{DeviceType, SubscriptionPlan};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("{} referenced id(s) do not belong to the parent", ids.len())]
    ForeignReference { ids: Vec<Uuid> },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// New `sort_order` for one row of a reorder batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortUpdate {
    pub id: Uuid,
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub plan: SubscriptionPlan,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateMenuParams {
    pub owner_id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub styling: MenuStyling,
    pub currency: String,
    pub default_locale: String,
}

#[derive(Debug, Clone)]
pub struct UpdateMenuParams {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub styling: MenuStyling,
    pub currency: String,
    pub default_locale: String,
}

#[async_trait]
pub trait MenusRepo: Send + Sync {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuRecord, RepoError>;

    async fn count_menus_for_owner(&self, owner_id: Uuid) -> Result<u64, RepoError>;

    async fn list_menus_for_owner(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<MenuRecord>, RepoError>;

    async fn find_menu(&self, id: Uuid) -> Result<Option<MenuRecord>, RepoError>;

    /// Owning user of a menu, `None` when the menu does not exist.
    async fn menu_owner(&self, id: Uuid) -> Result<Option<Uuid>, RepoError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError>;

    async fn update_menu(&self, params: UpdateMenuParams) -> Result<MenuRecord, RepoError>;

    /// Flip a menu to published when it owns at least one category.
    /// Returns `None` (and changes nothing) when it has none.
    async fn publish_menu(
        &self,
        id: Uuid,
        published_at: OffsetDateTime,
    ) -> Result<Option<MenuRecord>, RepoError>;

    async fn unpublish_menu(&self, id: Uuid) -> Result<MenuRecord, RepoError>;

    async fn delete_menu(&self, id: Uuid) -> Result<(), RepoError>;

    async fn load_menu_detail(&self, id: Uuid) -> Result<Option<MenuDetail>, RepoError>;

    async fn find_published_detail_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<MenuDetail>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCategoryParams {
    pub menu_id: Uuid,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
}

#[derive(Debug, Clone)]
pub struct UpdateCategoryParams {
    pub menu_id: Uuid,
    pub id: Uuid,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn count_categories(&self, menu_id: Uuid) -> Result<u64, RepoError>;

    /// Insert at the end of the menu's current ordering.
    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    async fn find_category(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CategoryRecord>, RepoError>;

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    async fn delete_category(&self, menu_id: Uuid, id: Uuid) -> Result<bool, RepoError>;

    async fn list_categories(&self, menu_id: Uuid) -> Result<Vec<CategoryRecord>, RepoError>;

    /// Apply the batch atomically. Fails with `ForeignReference` and changes
    /// nothing if any id does not belong to the menu.
    async fn reorder_categories(
        &self,
        menu_id: Uuid,
        updates: &[SortUpdate],
    ) -> Result<Vec<CategoryRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateProductParams {
    pub category_id: Uuid,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub price: i64,
    pub image_url: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateProductParams {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub price: i64,
    pub image_url: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone)]
pub struct CreateVariationParams {
    pub product_id: Uuid,
    pub name: LocalizedText,
    pub price: Option<i64>,
}

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    async fn count_products_for_menu(&self, menu_id: Uuid) -> Result<u64, RepoError>;

    async fn create_product(&self, params: CreateProductParams)
    -> Result<ProductRecord, RepoError>;

    /// Product by id, scoped to the menu that owns its category.
    async fn find_product(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ProductRecord>, RepoError>;

    async fn update_product(&self, params: UpdateProductParams)
    -> Result<ProductRecord, RepoError>;

    async fn delete_product(&self, menu_id: Uuid, id: Uuid) -> Result<bool, RepoError>;

    async fn list_products(&self, menu_id: Uuid) -> Result<Vec<ProductRecord>, RepoError>;

    async fn reorder_products(
        &self,
        menu_id: Uuid,
        updates: &[SortUpdate],
    ) -> Result<Vec<ProductRecord>, RepoError>;

    async fn create_variation(
        &self,
        params: CreateVariationParams,
    ) -> Result<VariationRecord, RepoError>;

    async fn delete_variation(&self, product_id: Uuid, id: Uuid) -> Result<bool, RepoError>;

    async fn list_variations(&self, product_id: Uuid) -> Result<Vec<VariationRecord>, RepoError>;

    async fn reorder_variations(
        &self,
        product_id: Uuid,
        updates: &[SortUpdate],
    ) -> Result<Vec<VariationRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePromotionParams {
    pub menu_id: Uuid,
    pub title: LocalizedText,
    pub description: Option<LocalizedText>,
    pub image_url: Option<String>,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub is_active: bool,
}

#[async_trait]
pub trait PromotionsRepo: Send + Sync {
    async fn create_promotion(
        &self,
        params: CreatePromotionParams,
    ) -> Result<PromotionRecord, RepoError>;

    async fn list_promotions(&self, menu_id: Uuid) -> Result<Vec<PromotionRecord>, RepoError>;

    async fn delete_promotion(&self, menu_id: Uuid, id: Uuid) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewMenuView {
    pub menu_id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub device: DeviceType,
    pub browser: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCount<K> {
    pub key: K,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTotals {
    pub total: u64,
    pub by_device: Vec<ViewCount<DeviceType>>,
    pub by_browser: Vec<ViewCount<String>>,
    pub by_day: Vec<ViewCount<time::Date>>,
}

#[async_trait]
pub trait ViewsRepo: Send + Sync {
    async fn record_view(&self, view: NewMenuView) -> Result<MenuViewRecord, RepoError>;

    async fn view_totals(
        &self,
        menu_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<ViewTotals, RepoError>;
}
