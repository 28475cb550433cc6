//! Application services: every use case the HTTP layer exposes, written
//! against repository and provider traits so storage and transports stay
//! replaceable.

pub mod access;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod health;
pub mod menus;
pub mod pagination;
pub mod promotions;
pub mod public_menu;
pub mod qr;
pub mod realtime;
pub mod repos;
pub mod side_effects;
pub mod uploads;
pub mod views;
