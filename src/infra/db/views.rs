use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    application::repos::{NewMenuView, RepoError, ViewCount, ViewTotals, ViewsRepo},
    domain::entities::MenuViewRecord,
    domain::types::DeviceType,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct MenuViewRow {
    id: Uuid,
    menu_id: Uuid,
    user_agent: Option<String>,
    ip_address: Option<String>,
    device: DeviceType,
    browser: String,
    created_at: OffsetDateTime,
}

impl From<MenuViewRow> for MenuViewRecord {
    fn from(row: MenuViewRow) -> Self {
        Self {
            id: row.id,
            menu_id: row.menu_id,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
            device: row.device,
            browser: row.browser,
            created_at: row.created_at,
        }
    }
}

fn counts<K>(rows: Vec<(K, i64)>) -> Result<Vec<ViewCount<K>>, RepoError> {
    rows.into_iter()
        .map(|(key, count)| {
            Ok(ViewCount {
                key,
                count: PostgresRepositories::convert_count(count)?,
            })
        })
        .collect()
}

#[async_trait]
impl ViewsRepo for PostgresRepositories {
    async fn record_view(&self, view: NewMenuView) -> Result<MenuViewRecord, RepoError> {
        let row = sqlx::query_as::<_, MenuViewRow>(
            r#"
            INSERT INTO menu_views (id, menu_id, user_agent, ip_address, device, browser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, menu_id, user_agent, ip_address, device, browser, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(view.menu_id)
        .bind(&view.user_agent)
        .bind(&view.ip_address)
        .bind(view.device)
        .bind(&view.browser)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn view_totals(
        &self,
        menu_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<ViewTotals, RepoError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM menu_views WHERE menu_id = $1 AND created_at >= $2",
        )
        .bind(menu_id)
        .bind(since)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let by_device: Vec<(DeviceType, i64)> = sqlx::query_as(
            r#"
            SELECT device, COUNT(*)
            FROM menu_views
            WHERE menu_id = $1 AND created_at >= $2
            GROUP BY device
            ORDER BY COUNT(*) DESC, device
            "#,
        )
        .bind(menu_id)
        .bind(since)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let by_browser: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT browser, COUNT(*)
            FROM menu_views
            WHERE menu_id = $1 AND created_at >= $2
            GROUP BY browser
            ORDER BY COUNT(*) DESC, browser
            "#,
        )
        .bind(menu_id)
        .bind(since)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let by_day: Vec<(Date, i64)> = sqlx::query_as(
            r#"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*)
            FROM menu_views
            WHERE menu_id = $1 AND created_at >= $2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(menu_id)
        .bind(since)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ViewTotals {
            total: Self::convert_count(total)?,
            by_device: counts(by_device)?,
            by_browser: counts(by_browser)?,
            by_day: counts(by_day)?,
        })
    }
}
