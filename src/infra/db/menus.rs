use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{Page, PageRequest},
    application::repos::{CreateMenuParams, MenusRepo, RepoError, UpdateMenuParams},
    domain::entities::{
        CategoryDetail, CategoryRecord, MenuDetail, MenuRecord, MenuStyling, ProductDetail,
        ProductRecord, PromotionRecord, VariationRecord,
    },
    domain::types::MenuStatus,
};

use super::catalog::{
    CATEGORY_COLUMNS, CategoryRow, PRODUCT_COLUMNS, ProductRow, VARIATION_COLUMNS, VariationRow,
};
use super::promotions::{PROMOTION_COLUMNS, PromotionRow};
use super::{PostgresRepositories, map_sqlx_error};

const MENU_COLUMNS: &str = "id, owner_id, slug, name, description, status, published_at, \
    theme, primary_color, accent_color, font_family, logo_url, cover_url, \
    currency, default_locale, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct MenuRow {
    id: Uuid,
    owner_id: Uuid,
    slug: String,
    name: String,
    description: Option<String>,
    status: MenuStatus,
    published_at: Option<OffsetDateTime>,
    theme: String,
    primary_color: Option<String>,
    accent_color: Option<String>,
    font_family: Option<String>,
    logo_url: Option<String>,
    cover_url: Option<String>,
    currency: String,
    default_locale: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<MenuRow> for MenuRecord {
    fn from(row: MenuRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            status: row.status,
            published_at: row.published_at,
            styling: MenuStyling {
                theme: row.theme,
                primary_color: row.primary_color,
                accent_color: row.accent_color,
                font_family: row.font_family,
                logo_url: row.logo_url,
                cover_url: row.cover_url,
            },
            currency: row.currency,
            default_locale: row.default_locale,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    /// Load the content tree of `menu`, ordered by `sort_order` at every level.
    async fn hydrate_menu(&self, menu: MenuRecord) -> Result<MenuDetail, RepoError> {
        let categories: Vec<CategoryRecord> = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories c
            WHERE c.menu_id = $1
            ORDER BY c.sort_order, c.created_at, c.id
            "#
        ))
        .bind(menu.id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(CategoryRecord::from)
        .collect();

        let products: Vec<ProductRecord> = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE c.menu_id = $1
            ORDER BY p.sort_order, p.created_at, p.id
            "#
        ))
        .bind(menu.id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(ProductRecord::from)
        .collect();

        let variations: Vec<VariationRecord> = sqlx::query_as::<_, VariationRow>(&format!(
            r#"
            SELECT {VARIATION_COLUMNS}
            FROM product_variations v
            JOIN products p ON p.id = v.product_id
            JOIN categories c ON c.id = p.category_id
            WHERE c.menu_id = $1
            ORDER BY v.sort_order, v.created_at, v.id
            "#
        ))
        .bind(menu.id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(VariationRecord::from)
        .collect();

        let promotions: Vec<PromotionRecord> = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            WHERE menu_id = $1
            ORDER BY starts_at, created_at, id
            "#
        ))
        .bind(menu.id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(PromotionRecord::from)
        .collect();

        Ok(assemble_detail(menu, categories, products, variations, promotions))
    }
}

/// Nest flat, pre-ordered rows into the menu tree. Input order is kept.
fn assemble_detail(
    menu: MenuRecord,
    categories: Vec<CategoryRecord>,
    products: Vec<ProductRecord>,
    variations: Vec<VariationRecord>,
    promotions: Vec<PromotionRecord>,
) -> MenuDetail {
    let mut variations_by_product: HashMap<Uuid, Vec<VariationRecord>> = HashMap::new();
    for variation in variations {
        variations_by_product
            .entry(variation.product_id)
            .or_default()
            .push(variation);
    }

    let mut products_by_category: HashMap<Uuid, Vec<ProductDetail>> = HashMap::new();
    for product in products {
        let variations = variations_by_product.remove(&product.id).unwrap_or_default();
        products_by_category
            .entry(product.category_id)
            .or_default()
            .push(ProductDetail {
                product,
                variations,
            });
    }

    let categories = categories
        .into_iter()
        .map(|category| {
            let products = products_by_category
                .remove(&category.id)
                .unwrap_or_default();
            CategoryDetail { category, products }
        })
        .collect();

    MenuDetail {
        menu,
        categories,
        promotions,
    }
}

#[async_trait]
impl MenusRepo for PostgresRepositories {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuRecord, RepoError> {
        let styling = &params.styling;
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            r#"
            INSERT INTO menus (
                id, owner_id, slug, name, description,
                theme, primary_color, accent_color, font_family, logo_url, cover_url,
                currency, default_locale
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.owner_id)
        .bind(&params.slug)
        .bind(&params.name)
        .bind(&params.description)
        .bind(&styling.theme)
        .bind(&styling.primary_color)
        .bind(&styling.accent_color)
        .bind(&styling.font_family)
        .bind(&styling.logo_url)
        .bind(&styling.cover_url)
        .bind(&params.currency)
        .bind(&params.default_locale)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn count_menus_for_owner(&self, owner_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM menus WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn list_menus_for_owner(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<MenuRecord>, RepoError> {
        let total = self.count_menus_for_owner(owner_id).await?;

        let rows = sqlx::query_as::<_, MenuRow>(&format!(
            r#"
            SELECT {MENU_COLUMNS}
            FROM menus
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let items = rows.into_iter().map(MenuRecord::from).collect();
        Ok(Page::new(items, page, total))
    }

    async fn find_menu(&self, id: Uuid) -> Result<Option<MenuRecord>, RepoError> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(MenuRecord::from))
    }

    async fn menu_owner(&self, id: Uuid) -> Result<Option<Uuid>, RepoError> {
        sqlx::query_scalar("SELECT owner_id FROM menus WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM menus WHERE slug = $1)")
            .bind(slug)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn update_menu(&self, params: UpdateMenuParams) -> Result<MenuRecord, RepoError> {
        let styling = &params.styling;
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            r#"
            UPDATE menus
            SET slug = $2,
                name = $3,
                description = $4,
                theme = $5,
                primary_color = $6,
                accent_color = $7,
                font_family = $8,
                logo_url = $9,
                cover_url = $10,
                currency = $11,
                default_locale = $12,
                updated_at = now()
            WHERE id = $1
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(&params.slug)
        .bind(&params.name)
        .bind(&params.description)
        .bind(&styling.theme)
        .bind(&styling.primary_color)
        .bind(&styling.accent_color)
        .bind(&styling.font_family)
        .bind(&styling.logo_url)
        .bind(&styling.cover_url)
        .bind(&params.currency)
        .bind(&params.default_locale)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn publish_menu(
        &self,
        id: Uuid,
        published_at: OffsetDateTime,
    ) -> Result<Option<MenuRecord>, RepoError> {
        // the category check and the status flip are one statement
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            r#"
            UPDATE menus
            SET status = 'published', published_at = $2, updated_at = now()
            WHERE id = $1
              AND EXISTS (SELECT 1 FROM categories WHERE menu_id = $1)
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(published_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(MenuRecord::from))
    }

    async fn unpublish_menu(&self, id: Uuid) -> Result<MenuRecord, RepoError> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            r#"
            UPDATE menus
            SET status = 'draft', published_at = NULL, updated_at = now()
            WHERE id = $1
            RETURNING {MENU_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_menu(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn load_menu_detail(&self, id: Uuid) -> Result<Option<MenuDetail>, RepoError> {
        match self.find_menu(id).await? {
            Some(menu) => self.hydrate_menu(menu).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_published_detail_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<MenuDetail>, RepoError> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE slug = $1 AND status = 'published'"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => self.hydrate_menu(row.into()).await.map(Some),
            None => Ok(None),
        }
    }
}
