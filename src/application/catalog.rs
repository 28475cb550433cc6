//! Menu content: categories, products and their variations.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::application::access::{MenuAccess, PlanGate};
use crate::application::error::{Resource, ServiceError};
use crate::application::menus::MenuService;
use crate::application::realtime::MenuEvent;
use crate::application::repos::{
    CategoriesRepo, CreateCategoryParams, CreateProductParams, CreateVariationParams,
    ProductsRepo, RepoError, SortUpdate, UpdateCategoryParams, UpdateProductParams,
};
use crate::domain::entities::{CategoryRecord, ProductRecord, VariationRecord};
use crate::domain::localized::LocalizedText;
use crate::domain::plans::{PlanFeature, PlanPolicy, PlanResource};

const MAX_NAME_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const MAX_REORDER_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
}

#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: LocalizedText,
    pub description: Option<LocalizedText>,
    pub price: i64,
    pub image_url: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub category_id: Option<Uuid>,
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub price: Option<i64>,
    /// `Some(None)` removes the current image.
    pub image_url: Option<Option<String>>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct VariationInput {
    pub name: LocalizedText,
    pub price: Option<i64>,
}

#[derive(Clone)]
pub struct CatalogService {
    categories: Arc<dyn CategoriesRepo>,
    products: Arc<dyn ProductsRepo>,
    plans: PlanGate,
    menus: MenuService,
}

impl CatalogService {
    pub fn new(
        categories: Arc<dyn CategoriesRepo>,
        products: Arc<dyn ProductsRepo>,
        plans: PlanGate,
        menus: MenuService,
    ) -> Self {
        Self {
            categories,
            products,
            plans,
            menus,
        }
    }

    pub async fn list_categories(
        &self,
        access: MenuAccess,
    ) -> Result<Vec<CategoryRecord>, ServiceError> {
        Ok(self.categories.list_categories(access.menu_id()).await?)
    }

    pub async fn create_category(
        &self,
        access: MenuAccess,
        input: CategoryInput,
    ) -> Result<CategoryRecord, ServiceError> {
        let policy = self.plans.policy_for(access.owner_id()).await?;
        let current = self.categories.count_categories(access.menu_id()).await?;
        policy.ensure_can_create(PlanResource::CategoriesPerMenu, current)?;

        let name = normalize_text(policy, input.name, "name", MAX_NAME_CHARS)?;
        let description = normalize_optional(policy, input.description, "description")?;

        let category = self
            .categories
            .create_category(CreateCategoryParams {
                menu_id: access.menu_id(),
                name,
                description,
            })
            .await?;

        self.changed(access, json!({ "categoryId": category.id, "action": "created" }))
            .await;
        Ok(category)
    }

    pub async fn update_category(
        &self,
        access: MenuAccess,
        category_id: Uuid,
        patch: CategoryPatch,
    ) -> Result<CategoryRecord, ServiceError> {
        let current = self.category(access, category_id).await?;
        let policy = self.plans.policy_for(access.owner_id()).await?;

        let name = match patch.name {
            Some(name) => normalize_text(policy, name, "name", MAX_NAME_CHARS)?,
            None => current.name,
        };
        let description = match patch.description {
            Some(description) => normalize_optional(policy, Some(description), "description")?,
            None => current.description,
        };

        let category = self
            .categories
            .update_category(UpdateCategoryParams {
                menu_id: access.menu_id(),
                id: category_id,
                name,
                description,
            })
            .await
            .map_err(|err| not_found_as(err, Resource::Category))?;

        self.changed(access, json!({ "categoryId": category.id, "action": "updated" }))
            .await;
        Ok(category)
    }

    pub async fn delete_category(
        &self,
        access: MenuAccess,
        category_id: Uuid,
    ) -> Result<(), ServiceError> {
        if !self
            .categories
            .delete_category(access.menu_id(), category_id)
            .await?
        {
            return Err(ServiceError::NotFound(Resource::Category));
        }
        self.changed(access, json!({ "categoryId": category_id, "action": "deleted" }))
            .await;
        Ok(())
    }

    /// Apply a new category ordering. Either every row changes or none does.
    pub async fn reorder_categories(
        &self,
        access: MenuAccess,
        updates: Vec<SortUpdate>,
    ) -> Result<Vec<CategoryRecord>, ServiceError> {
        check_reorder_batch(&updates)?;
        let categories = self
            .categories
            .reorder_categories(access.menu_id(), &updates)
            .await
            .map_err(foreign_ids)?;

        self.menus
            .content_changed(
                access.menu_id(),
                MenuEvent::CategoriesReordered,
                json!({ "menuId": access.menu_id(), "categories": sort_payload(&updates) }),
            )
            .await;
        Ok(categories)
    }

    pub async fn list_products(
        &self,
        access: MenuAccess,
    ) -> Result<Vec<ProductRecord>, ServiceError> {
        Ok(self.products.list_products(access.menu_id()).await?)
    }

    pub async fn create_product(
        &self,
        access: MenuAccess,
        category_id: Uuid,
        input: ProductInput,
    ) -> Result<ProductRecord, ServiceError> {
        self.category(access, category_id).await?;

        let policy = self.plans.policy_for(access.owner_id()).await?;
        let current = self
            .products
            .count_products_for_menu(access.menu_id())
            .await?;
        policy.ensure_can_create(PlanResource::ProductsPerMenu, current)?;

        let name = normalize_text(policy, input.name, "name", MAX_NAME_CHARS)?;
        let description = normalize_optional(policy, input.description, "description")?;
        check_price("price", input.price)?;

        let product = self
            .products
            .create_product(CreateProductParams {
                category_id,
                name,
                description,
                price: input.price,
                image_url: input.image_url,
                is_available: input.is_available,
            })
            .await?;

        self.changed(access, json!({ "productId": product.id, "action": "created" }))
            .await;
        Ok(product)
    }

    pub async fn update_product(
        &self,
        access: MenuAccess,
        product_id: Uuid,
        patch: ProductPatch,
    ) -> Result<ProductRecord, ServiceError> {
        let current = self.product(access, product_id).await?;
        let policy = self.plans.policy_for(access.owner_id()).await?;

        let category_id = match patch.category_id {
            Some(category_id) if category_id != current.category_id => {
                self.category(access, category_id).await?.id
            }
            _ => current.category_id,
        };
        let name = match patch.name {
            Some(name) => normalize_text(policy, name, "name", MAX_NAME_CHARS)?,
            None => current.name,
        };
        let description = match patch.description {
            Some(description) => normalize_optional(policy, Some(description), "description")?,
            None => current.description,
        };
        let price = patch.price.unwrap_or(current.price);
        check_price("price", price)?;

        let product = self
            .products
            .update_product(UpdateProductParams {
                id: product_id,
                category_id,
                name,
                description,
                price,
                image_url: patch.image_url.unwrap_or(current.image_url),
                is_available: patch.is_available.unwrap_or(current.is_available),
            })
            .await
            .map_err(|err| not_found_as(err, Resource::Product))?;

        self.changed(access, json!({ "productId": product.id, "action": "updated" }))
            .await;
        Ok(product)
    }

    pub async fn delete_product(
        &self,
        access: MenuAccess,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        if !self
            .products
            .delete_product(access.menu_id(), product_id)
            .await?
        {
            return Err(ServiceError::NotFound(Resource::Product));
        }
        self.changed(access, json!({ "productId": product_id, "action": "deleted" }))
            .await;
        Ok(())
    }

    pub async fn reorder_products(
        &self,
        access: MenuAccess,
        updates: Vec<SortUpdate>,
    ) -> Result<Vec<ProductRecord>, ServiceError> {
        check_reorder_batch(&updates)?;
        let products = self
            .products
            .reorder_products(access.menu_id(), &updates)
            .await
            .map_err(foreign_ids)?;

        self.menus
            .content_changed(
                access.menu_id(),
                MenuEvent::ProductsReordered,
                json!({ "menuId": access.menu_id(), "products": sort_payload(&updates) }),
            )
            .await;
        Ok(products)
    }

    pub async fn list_variations(
        &self,
        access: MenuAccess,
        product_id: Uuid,
    ) -> Result<Vec<VariationRecord>, ServiceError> {
        self.product(access, product_id).await?;
        Ok(self.products.list_variations(product_id).await?)
    }

    pub async fn create_variation(
        &self,
        access: MenuAccess,
        product_id: Uuid,
        input: VariationInput,
    ) -> Result<VariationRecord, ServiceError> {
        self.product(access, product_id).await?;
        let policy = self.plans.policy_for(access.owner_id()).await?;

        let name = normalize_text(policy, input.name, "name", MAX_NAME_CHARS)?;
        if let Some(price) = input.price {
            check_price("price", price)?;
        }

        let variation = self
            .products
            .create_variation(CreateVariationParams {
                product_id,
                name,
                price: input.price,
            })
            .await?;

        self.changed(
            access,
            json!({ "productId": product_id, "variationId": variation.id, "action": "created" }),
        )
        .await;
        Ok(variation)
    }

    pub async fn delete_variation(
        &self,
        access: MenuAccess,
        product_id: Uuid,
        variation_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.product(access, product_id).await?;
        if !self
            .products
            .delete_variation(product_id, variation_id)
            .await?
        {
            return Err(ServiceError::NotFound(Resource::Variation));
        }
        self.changed(
            access,
            json!({ "productId": product_id, "variationId": variation_id, "action": "deleted" }),
        )
        .await;
        Ok(())
    }

    pub async fn reorder_variations(
        &self,
        access: MenuAccess,
        product_id: Uuid,
        updates: Vec<SortUpdate>,
    ) -> Result<Vec<VariationRecord>, ServiceError> {
        self.product(access, product_id).await?;
        check_reorder_batch(&updates)?;
        let variations = self
            .products
            .reorder_variations(product_id, &updates)
            .await
            .map_err(foreign_ids)?;

        self.menus
            .content_changed(
                access.menu_id(),
                MenuEvent::VariationsReordered,
                json!({
                    "menuId": access.menu_id(),
                    "productId": product_id,
                    "variations": sort_payload(&updates),
                }),
            )
            .await;
        Ok(variations)
    }

    async fn category(
        &self,
        access: MenuAccess,
        category_id: Uuid,
    ) -> Result<CategoryRecord, ServiceError> {
        self.categories
            .find_category(access.menu_id(), category_id)
            .await?
            .ok_or(ServiceError::NotFound(Resource::Category))
    }

    async fn product(
        &self,
        access: MenuAccess,
        product_id: Uuid,
    ) -> Result<ProductRecord, ServiceError> {
        self.products
            .find_product(access.menu_id(), product_id)
            .await?
            .ok_or(ServiceError::NotFound(Resource::Product))
    }

    async fn changed(&self, access: MenuAccess, payload: serde_json::Value) {
        self.menus
            .content_changed(access.menu_id(), MenuEvent::Updated, payload)
            .await;
    }
}

/// Reject empty batches, oversized batches and repeated ids before touching storage.
pub fn check_reorder_batch(updates: &[SortUpdate]) -> Result<(), ServiceError> {
    if updates.is_empty() {
        return Err(ServiceError::validation("reorder batch must not be empty"));
    }
    if updates.len() > MAX_REORDER_BATCH {
        return Err(ServiceError::validation(format!(
            "reorder batch exceeds {MAX_REORDER_BATCH} items"
        )));
    }

    let mut seen = HashSet::with_capacity(updates.len());
    let duplicates: Vec<Uuid> = updates
        .iter()
        .filter(|update| !seen.insert(update.id))
        .map(|update| update.id)
        .collect();
    if !duplicates.is_empty() {
        return Err(ServiceError::validation_with(
            "reorder batch repeats ids",
            json!({ "duplicateIds": duplicates }),
        ));
    }

    if let Some(update) = updates.iter().find(|update| update.sort_order < 0) {
        return Err(ServiceError::validation_with(
            "sortOrder must not be negative",
            json!({ "id": update.id }),
        ));
    }
    Ok(())
}

fn sort_payload(updates: &[SortUpdate]) -> serde_json::Value {
    updates
        .iter()
        .map(|update| json!({ "id": update.id, "sortOrder": update.sort_order }))
        .collect()
}

fn foreign_ids(err: RepoError) -> ServiceError {
    match err {
        RepoError::ForeignReference { ids } => ServiceError::validation_with(
            "reorder batch references ids outside the parent",
            json!({ "foreignIds": ids }),
        ),
        other => ServiceError::from(other),
    }
}

fn not_found_as(err: RepoError, resource: Resource) -> ServiceError {
    match err {
        RepoError::NotFound => ServiceError::NotFound(resource),
        other => ServiceError::from(other),
    }
}

fn check_price(field: &'static str, price: i64) -> Result<(), ServiceError> {
    if price < 0 {
        return Err(ServiceError::validation_with(
            format!("{field} must not be negative"),
            json!({ field: ["must not be negative"] }),
        ));
    }
    Ok(())
}

fn normalize_text(
    policy: &PlanPolicy,
    text: LocalizedText,
    field: &str,
    max_chars: usize,
) -> Result<LocalizedText, ServiceError> {
    if text.len() > 1 {
        policy.ensure_feature(PlanFeature::MultiLanguage)?;
    }
    Ok(text.normalize(field, max_chars)?)
}

fn normalize_optional(
    policy: &PlanPolicy,
    text: Option<LocalizedText>,
    field: &str,
) -> Result<Option<LocalizedText>, ServiceError> {
    match text {
        Some(text) if !text.is_empty() => {
            normalize_text(policy, text, field, MAX_DESCRIPTION_CHARS).map(Some)
        }
        _ => Ok(None),
    }
}
