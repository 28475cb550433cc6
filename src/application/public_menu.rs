//! Cache-aside read path for published menus.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::error::{Resource, ServiceError};
use crate::application::repos::MenusRepo;
use crate::application::side_effects::SideEffects;
use crate::cache::CacheKey;
use crate::domain::entities::PublicMenu;

#[derive(Clone)]
pub struct PublicMenuService {
    menus: Arc<dyn MenusRepo>,
    effects: SideEffects,
    ttl: Duration,
}

impl PublicMenuService {
    pub fn new(menus: Arc<dyn MenusRepo>, effects: SideEffects, ttl: Duration) -> Self {
        Self {
            menus,
            effects,
            ttl,
        }
    }

    /// Resolve a published menu by slug.
    ///
    /// Misses are never cached, so a slug that later gets published is
    /// visible immediately.
    pub async fn get(&self, slug: &str) -> Result<PublicMenu, ServiceError> {
        let key = CacheKey::PublicMenu(slug.to_string()).render();

        if let Some(menu) = self.cached(&key).await {
            counter!("menuqr_cache_hit_total", "cache" => "public_menu").increment(1);
            return Ok(menu);
        }
        counter!("menuqr_cache_miss_total", "cache" => "public_menu").increment(1);

        let since = self.effects.epoch();
        let detail = self
            .menus
            .find_published_detail_by_slug(slug)
            .await?
            .ok_or(ServiceError::NotFound(Resource::Menu))?;
        let menu = PublicMenu::from_detail(detail, OffsetDateTime::now_utc());

        match serde_json::to_string(&menu) {
            Ok(payload) => self.effects.populate(key, payload, self.ttl, since).await,
            Err(err) => warn!(target = "menuqr::public", slug, error = %err, "public menu encode failed"),
        }
        Ok(menu)
    }

    async fn cached(&self, key: &str) -> Option<PublicMenu> {
        match self.effects.cache().get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(menu) => Some(menu),
                Err(err) => {
                    warn!(target = "menuqr::public", key, error = %err, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                counter!("menuqr_cache_error_total", "op" => "get").increment(1);
                debug!(target = "menuqr::public", key, error = %err, "cache read failed, falling back to database");
                None
            }
        }
    }
}
