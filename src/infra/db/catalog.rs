use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CategoriesRepo, CreateCategoryParams, CreateProductParams, CreateVariationParams,
        ProductsRepo, RepoError, SortUpdate, UpdateCategoryParams, UpdateProductParams,
    },
    domain::entities::{CategoryRecord, ProductRecord, VariationRecord},
    domain::localized::LocalizedText,
};

use super::{PostgresRepositories, foreign_ids, map_sqlx_error};

pub(super) const CATEGORY_COLUMNS: &str =
    "c.id, c.menu_id, c.name, c.description, c.sort_order, c.created_at, c.updated_at";
pub(super) const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.description, p.price, \
    p.image_url, p.is_available, p.sort_order, p.created_at, p.updated_at";
pub(super) const VARIATION_COLUMNS: &str = "v.id, v.product_id, v.name, v.price, v.sort_order";

#[derive(sqlx::FromRow)]
pub(super) struct CategoryRow {
    id: Uuid,
    menu_id: Uuid,
    name: Json<LocalizedText>,
    description: Option<Json<LocalizedText>>,
    sort_order: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            menu_id: row.menu_id,
            name: row.name.0,
            description: row.description.map(|d| d.0),
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ProductRow {
    id: Uuid,
    category_id: Uuid,
    name: Json<LocalizedText>,
    description: Option<Json<LocalizedText>>,
    price: i64,
    image_url: Option<String>,
    is_available: bool,
    sort_order: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name.0,
            description: row.description.map(|d| d.0),
            price: row.price,
            image_url: row.image_url,
            is_available: row.is_available,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct VariationRow {
    id: Uuid,
    product_id: Uuid,
    name: Json<LocalizedText>,
    price: Option<i64>,
    sort_order: i32,
}

impl From<VariationRow> for VariationRecord {
    fn from(row: VariationRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            name: row.name.0,
            price: row.price,
            sort_order: row.sort_order,
        }
    }
}

fn split_updates(updates: &[SortUpdate]) -> (Vec<Uuid>, Vec<i32>) {
    updates.iter().map(|u| (u.id, u.sort_order)).unzip()
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn count_categories(&self, menu_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE menu_id = $1")
            .bind(menu_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn create_category(
        &self,
        params: CreateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            INSERT INTO categories AS c (id, menu_id, name, description, sort_order)
            VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM categories WHERE menu_id = $2)
            )
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.menu_id)
        .bind(Json(&params.name))
        .bind(params.description.as_ref().map(Json))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_category(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.menu_id = $1 AND c.id = $2"
        ))
        .bind(menu_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn update_category(
        &self,
        params: UpdateCategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            UPDATE categories AS c
            SET name = $3, description = $4, updated_at = now()
            WHERE c.menu_id = $1 AND c.id = $2
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(params.menu_id)
        .bind(params.id)
        .bind(Json(&params.name))
        .bind(params.description.as_ref().map(Json))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_category(&self, menu_id: Uuid, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM categories WHERE menu_id = $1 AND id = $2")
            .bind(menu_id)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_categories(&self, menu_id: Uuid) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories c
            WHERE c.menu_id = $1
            ORDER BY c.sort_order, c.created_at, c.id
            "#
        ))
        .bind(menu_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn reorder_categories(
        &self,
        menu_id: Uuid,
        updates: &[SortUpdate],
    ) -> Result<Vec<CategoryRecord>, RepoError> {
        let (ids, orders) = split_updates(updates);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let owned: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM categories
            WHERE menu_id = $1 AND id = ANY($2)
            FOR UPDATE
            "#,
        )
        .bind(menu_id)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let foreign = foreign_ids(&ids, &owned);
        if !foreign.is_empty() {
            return Err(RepoError::ForeignReference { ids: foreign });
        }

        sqlx::query(
            r#"
            UPDATE categories AS c
            SET sort_order = u.sort_order, updated_at = now()
            FROM UNNEST($2::uuid[], $3::int4[]) AS u(id, sort_order)
            WHERE c.id = u.id AND c.menu_id = $1
            "#,
        )
        .bind(menu_id)
        .bind(&ids)
        .bind(&orders)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        self.list_categories(menu_id).await
    }
}

#[async_trait]
impl ProductsRepo for PostgresRepositories {
    async fn count_products_for_menu(&self, menu_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE c.menu_id = $1
            "#,
        )
        .bind(menu_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn create_product(
        &self,
        params: CreateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products AS p
                (id, category_id, name, description, price, image_url, is_available, sort_order)
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM products WHERE category_id = $2)
            )
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.category_id)
        .bind(Json(&params.name))
        .bind(params.description.as_ref().map(Json))
        .bind(params.price)
        .bind(&params.image_url)
        .bind(params.is_available)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_product(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ProductRecord>, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE c.menu_id = $1 AND p.id = $2
            "#
        ))
        .bind(menu_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ProductRecord::from))
    }

    async fn update_product(
        &self,
        params: UpdateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products AS p
            SET category_id = $2,
                name = $3,
                description = $4,
                price = $5,
                image_url = $6,
                is_available = $7,
                updated_at = now()
            WHERE p.id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(params.id)
        .bind(params.category_id)
        .bind(Json(&params.name))
        .bind(params.description.as_ref().map(Json))
        .bind(params.price)
        .bind(&params.image_url)
        .bind(params.is_available)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_product(&self, menu_id: Uuid, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM products p
            USING categories c
            WHERE p.category_id = c.id AND c.menu_id = $1 AND p.id = $2
            "#,
        )
        .bind(menu_id)
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&self, menu_id: Uuid) -> Result<Vec<ProductRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE c.menu_id = $1
            ORDER BY c.sort_order, c.id, p.sort_order, p.created_at, p.id
            "#
        ))
        .bind(menu_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn reorder_products(
        &self,
        menu_id: Uuid,
        updates: &[SortUpdate],
    ) -> Result<Vec<ProductRecord>, RepoError> {
        let (ids, orders) = split_updates(updates);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let owned: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.id
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE c.menu_id = $1 AND p.id = ANY($2)
            FOR UPDATE OF p
            "#,
        )
        .bind(menu_id)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let foreign = foreign_ids(&ids, &owned);
        if !foreign.is_empty() {
            return Err(RepoError::ForeignReference { ids: foreign });
        }

        sqlx::query(
            r#"
            UPDATE products AS p
            SET sort_order = u.sort_order, updated_at = now()
            FROM UNNEST($1::uuid[], $2::int4[]) AS u(id, sort_order)
            WHERE p.id = u.id
            "#,
        )
        .bind(&ids)
        .bind(&orders)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        self.list_products(menu_id).await
    }

    async fn create_variation(
        &self,
        params: CreateVariationParams,
    ) -> Result<VariationRecord, RepoError> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            r#"
            INSERT INTO product_variations AS v (id, product_id, name, price, sort_order)
            VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM product_variations WHERE product_id = $2)
            )
            RETURNING {VARIATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.product_id)
        .bind(Json(&params.name))
        .bind(params.price)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_variation(&self, product_id: Uuid, id: Uuid) -> Result<bool, RepoError> {
        let result =
            sqlx::query("DELETE FROM product_variations WHERE product_id = $1 AND id = $2")
                .bind(product_id)
                .bind(id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_variations(&self, product_id: Uuid) -> Result<Vec<VariationRecord>, RepoError> {
        let rows = sqlx::query_as::<_, VariationRow>(&format!(
            r#"
            SELECT {VARIATION_COLUMNS}
            FROM product_variations v
            WHERE v.product_id = $1
            ORDER BY v.sort_order, v.created_at, v.id
            "#
        ))
        .bind(product_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(VariationRecord::from).collect())
    }

    async fn reorder_variations(
        &self,
        product_id: Uuid,
        updates: &[SortUpdate],
    ) -> Result<Vec<VariationRecord>, RepoError> {
        let (ids, orders) = split_updates(updates);
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let owned: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM product_variations
            WHERE product_id = $1 AND id = ANY($2)
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let foreign = foreign_ids(&ids, &owned);
        if !foreign.is_empty() {
            return Err(RepoError::ForeignReference { ids: foreign });
        }

        sqlx::query(
            r#"
            UPDATE product_variations AS v
            SET sort_order = u.sort_order
            FROM UNNEST($2::uuid[], $3::int4[]) AS u(id, sort_order)
            WHERE v.id = u.id AND v.product_id = $1
            "#,
        )
        .bind(product_id)
        .bind(&ids)
        .bind(&orders)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        self.list_variations(product_id).await
    }
}
