//! In-process cache backend.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tracing::warn;

use super::{CacheError, MenuCache};

const SOURCE: &str = "cache::store";
const DEFAULT_CAPACITY: usize = 256;
/// Upper bound for entry lifetimes; longer TTLs are clamped.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct Entry {
    value: String,
    expires_at: Instant,
}

/// LRU-bounded map with per-entry expiry. Expired entries are dropped lazily on read.
pub struct LocalMenuCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl LocalMenuCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, LruCache<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    target_module = SOURCE,
                    result = "poisoned_recovered",
                    "Recovered from poisoned cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

impl Default for LocalMenuCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl MenuCache for LocalMenuCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.lock("get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl.min(MAX_TTL))
            .unwrap_or(now);
        let entry = Entry { value, expires_at };
        self.lock("set").put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.lock("delete");
        for key in keys {
            entries.pop(key.as_str());
        }
        Ok(())
    }
}
