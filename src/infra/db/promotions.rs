use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreatePromotionParams, PromotionsRepo, RepoError},
    domain::entities::PromotionRecord,
    domain::localized::LocalizedText,
};

use super::{PostgresRepositories, map_sqlx_error};

pub(super) const PROMOTION_COLUMNS: &str =
    "id, menu_id, title, description, image_url, starts_at, ends_at, is_active, created_at";

#[derive(sqlx::FromRow)]
pub(super) struct PromotionRow {
    id: Uuid,
    menu_id: Uuid,
    title: Json<LocalizedText>,
    description: Option<Json<LocalizedText>>,
    image_url: Option<String>,
    starts_at: OffsetDateTime,
    ends_at: OffsetDateTime,
    is_active: bool,
    created_at: OffsetDateTime,
}

impl From<PromotionRow> for PromotionRecord {
    fn from(row: PromotionRow) -> Self {
        Self {
            id: row.id,
            menu_id: row.menu_id,
            title: row.title.0,
            description: row.description.map(|d| d.0),
            image_url: row.image_url,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PromotionsRepo for PostgresRepositories {
    async fn create_promotion(
        &self,
        params: CreatePromotionParams,
    ) -> Result<PromotionRecord, RepoError> {
        let row = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            INSERT INTO promotions
                (id, menu_id, title, description, image_url, starts_at, ends_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.menu_id)
        .bind(Json(&params.title))
        .bind(params.description.as_ref().map(Json))
        .bind(&params.image_url)
        .bind(params.starts_at)
        .bind(params.ends_at)
        .bind(params.is_active)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn list_promotions(&self, menu_id: Uuid) -> Result<Vec<PromotionRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PromotionRow>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS}
            FROM promotions
            WHERE menu_id = $1
            ORDER BY starts_at, created_at, id
            "#
        ))
        .bind(menu_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PromotionRecord::from).collect())
    }

    async fn delete_promotion(&self, menu_id: Uuid, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM promotions WHERE menu_id = $1 AND id = $2")
            .bind(menu_id)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}
