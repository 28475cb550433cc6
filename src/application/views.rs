//! Public view tracking and owner-facing analytics.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::access::{MenuAccess, PlanGate};
use crate::application::error::{Resource, ServiceError};
use crate::application::repos::{MenusRepo, NewMenuView, ViewsRepo};
use crate::application::side_effects::SideEffects;
use crate::cache::CacheKey;
use crate::domain::analytics::{classify_browser, classify_device};
use crate::domain::entities::MenuViewRecord;
use crate::domain::plans::PlanFeature;
use crate::domain::types::{DeviceType, MenuStatus};

pub const DEFAULT_STATS_DAYS: u32 = 30;
pub const MAX_STATS_DAYS: u32 = 365;
const MAX_USER_AGENT_CHARS: usize = 512;

/// Request metadata captured for a view.
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCount {
    pub device: DeviceType,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCount {
    pub browser: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    /// Calendar day in UTC, `YYYY-MM-DD`.
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuStats {
    pub menu_id: Uuid,
    pub days: u32,
    pub total_views: u64,
    pub by_device: Vec<DeviceCount>,
    pub by_browser: Vec<BrowserCount>,
    pub daily: Vec<DailyCount>,
}

#[derive(Clone)]
pub struct ViewService {
    menus: Arc<dyn MenusRepo>,
    views: Arc<dyn ViewsRepo>,
    plans: PlanGate,
    effects: SideEffects,
    stats_ttl: Duration,
}

impl ViewService {
    pub fn new(
        menus: Arc<dyn MenusRepo>,
        views: Arc<dyn ViewsRepo>,
        plans: PlanGate,
        effects: SideEffects,
        stats_ttl: Duration,
    ) -> Self {
        Self {
            menus,
            views,
            plans,
            effects,
            stats_ttl,
        }
    }

    /// Record one view of a published menu. Every call inserts a row.
    pub async fn track(
        &self,
        menu_id: Uuid,
        context: ViewContext,
    ) -> Result<MenuViewRecord, ServiceError> {
        let menu = self
            .menus
            .find_menu(menu_id)
            .await?
            .ok_or(ServiceError::NotFound(Resource::Menu))?;
        if menu.status != MenuStatus::Published {
            return Err(ServiceError::Forbidden("menu is not published"));
        }

        let user_agent = context
            .user_agent
            .map(|ua| ua.chars().take(MAX_USER_AGENT_CHARS).collect::<String>())
            .filter(|ua| !ua.trim().is_empty());
        let agent = user_agent.as_deref().unwrap_or_default();
        let device = classify_device(agent);
        let browser = classify_browser(agent);

        let view = self
            .views
            .record_view(NewMenuView {
                menu_id,
                user_agent,
                ip_address: context.ip_address,
                device,
                browser: browser.to_string(),
            })
            .await?;

        counter!("menuqr_views_tracked_total", "device" => device.as_str()).increment(1);
        debug!(
            target = "menuqr::views",
            menu_id = %menu_id,
            device = device.as_str(),
            browser,
            "view tracked"
        );
        Ok(view)
    }

    /// Aggregate views over the trailing `days`.
    ///
    /// The default window is served from cache; other windows are computed on
    /// demand.
    pub async fn stats(&self, access: MenuAccess, days: u32) -> Result<MenuStats, ServiceError> {
        let policy = self.plans.policy_for(access.owner_id()).await?;
        policy.ensure_feature(PlanFeature::Analytics)?;

        if !(1..=MAX_STATS_DAYS).contains(&days) {
            return Err(ServiceError::validation(format!(
                "days must be between 1 and {MAX_STATS_DAYS}"
            )));
        }

        let cache_key = (days == DEFAULT_STATS_DAYS)
            .then(|| CacheKey::MenuStats(access.menu_id()).render());

        if let Some(key) = cache_key.as_deref()
            && let Some(stats) = self.cached_stats(key).await
        {
            return Ok(stats);
        }

        let epoch = self.effects.epoch();
        let since = OffsetDateTime::now_utc() - time::Duration::days(i64::from(days));
        let totals = self.views.view_totals(access.menu_id(), since).await?;
        let stats = MenuStats {
            menu_id: access.menu_id(),
            days,
            total_views: totals.total,
            by_device: totals
                .by_device
                .into_iter()
                .map(|row| DeviceCount {
                    device: row.key,
                    count: row.count,
                })
                .collect(),
            by_browser: totals
                .by_browser
                .into_iter()
                .map(|row| BrowserCount {
                    browser: row.key,
                    count: row.count,
                })
                .collect(),
            daily: totals
                .by_day
                .into_iter()
                .map(|row| DailyCount {
                    date: row.key.to_string(),
                    count: row.count,
                })
                .collect(),
        };

        if let Some(key) = cache_key {
            match serde_json::to_string(&stats) {
                Ok(payload) => self.effects.populate(key, payload, self.stats_ttl, epoch).await,
                Err(err) => warn!(target = "menuqr::views", error = %err, "stats encode failed"),
            }
        }
        Ok(stats)
    }

    async fn cached_stats(&self, key: &str) -> Option<MenuStats> {
        match self.effects.cache().get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(stats) => Some(stats),
                Err(err) => {
                    warn!(target = "menuqr::views", key, error = %err, "discarding cached stats");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(target = "menuqr::views", key, error = %err, "stats cache read failed");
                None
            }
        }
    }
}
