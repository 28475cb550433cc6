//! Cache-aside storage for published menus.
//!
//! Two backends implement [`MenuCache`]:
//!
//! - **Redis** ([`RedisMenuCache`]): shared across instances, used when
//!   `cache.redis_url` is configured.
//! - **Local** ([`LocalMenuCache`]): an in-process LRU with per-entry TTL,
//!   used when Redis is absent and in tests.
//!
//! Values are opaque JSON strings; typed (de)serialization happens in the
//! services that own each key.

mod keys;
mod remote;
mod store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use keys::CacheKey;
pub use remote::RedisMenuCache;
pub use store::LocalMenuCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait MenuCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;
}
