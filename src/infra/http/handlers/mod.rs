//! HTTP handlers grouped by resource.
//!
//! Owner-scoped handlers resolve ownership through `MenuService::authorize`
//! before they look at the request body, so a stranger learns nothing about
//! payload rules for menus they do not own.

mod auth;
mod catalog;
mod health;
mod menus;
mod promotions;
mod public;
mod qr;
mod uploads;
mod views;

pub use auth::*;
pub use catalog::*;
pub use health::*;
pub use menus::*;
pub use promotions::*;
pub use public::*;
pub use qr::*;
pub use uploads::*;
pub use views::*;
