use std::sync::Arc;

use crate::application::auth::AuthService;
use crate::application::catalog::CatalogService;
use crate::application::health::HealthService;
use crate::application::menus::MenuService;
use crate::application::promotions::PromotionService;
use crate::application::public_menu::PublicMenuService;
use crate::application::qr::QrService;
use crate::application::uploads::UploadService;
use crate::application::views::ViewService;

use super::rate_limit::RateLimiter;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub menus: Arc<MenuService>,
    pub catalog: Arc<CatalogService>,
    pub promotions: Arc<PromotionService>,
    pub views: Arc<ViewService>,
    pub public_menus: Arc<PublicMenuService>,
    pub qr: Arc<QrService>,
    pub uploads: Arc<UploadService>,
    pub health: Arc<HealthService>,
    pub rate_limiter: Arc<RateLimiter>,
}
