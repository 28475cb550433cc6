//! Multi-tenant backend for digital restaurant menus served through QR codes.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
