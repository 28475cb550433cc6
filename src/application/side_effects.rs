//! Post-commit side effects.
//!
//! Every mutation funnels its cache and real-time work through
//! [`SideEffects`] so the policy is uniform:
//!
//! - invalidation is awaited, so the next read cannot observe stale data;
//! - population and broadcasts run detached, each logging its own failure.
//!
//! None of these ever fail the request that triggered them.
//!
//! Writes carry the [`Epoch`] observed before their source data was read.
//! Invalidation stamps each key with a fresh epoch, and a write that started
//! before the newest stamp removes itself again, so a late population can
//! never resurrect an entry an invalidation already dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::realtime::{Broadcaster, MenuEvent, menu_channel};
use crate::cache::MenuCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Detach population and broadcasts onto the runtime.
    #[default]
    Background,
    /// Await them in place. Errors are still swallowed.
    Inline,
}

/// Monotonic counter ordering reads against invalidations.
pub type Epoch = u64;

#[derive(Default)]
struct Invalidations {
    counter: AtomicU64,
    stamped: DashMap<String, Epoch>,
}

impl Invalidations {
    fn current(&self) -> Epoch {
        self.counter.load(Ordering::SeqCst)
    }

    fn stamp(&self, keys: &[String]) {
        let epoch = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        for key in keys {
            self.stamped.insert(key.clone(), epoch);
        }
    }

    fn is_stale(&self, key: &str, since: Epoch) -> bool {
        self.stamped
            .get(key)
            .is_some_and(|stamped| *stamped > since)
    }
}

#[derive(Clone)]
pub struct SideEffects {
    cache: Arc<dyn MenuCache>,
    broadcaster: Arc<dyn Broadcaster>,
    mode: DispatchMode,
    invalidations: Arc<Invalidations>,
}

impl SideEffects {
    pub fn new(
        cache: Arc<dyn MenuCache>,
        broadcaster: Arc<dyn Broadcaster>,
        mode: DispatchMode,
    ) -> Self {
        Self {
            cache,
            broadcaster,
            mode,
            invalidations: Arc::new(Invalidations::default()),
        }
    }

    /// Epoch to capture before reading the data a cache write will hold.
    pub fn epoch(&self) -> Epoch {
        self.invalidations.current()
    }

    pub fn cache(&self) -> &Arc<dyn MenuCache> {
        &self.cache
    }

    /// Remove cached entries before the response is sent.
    pub async fn invalidate(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        self.invalidations.stamp(&keys);
        if let Err(err) = self.cache.delete(&keys).await {
            counter!("menuqr_cache_error_total", "op" => "delete").increment(1);
            warn!(
                target = "menuqr::cache",
                keys = ?keys,
                error = %err,
                "cache invalidation failed"
            );
        }
    }

    /// Write an entry in the background. Used by read paths.
    pub async fn populate(&self, key: String, value: String, ttl: Duration, since: Epoch) {
        let cache = self.cache.clone();
        let invalidations = self.invalidations.clone();
        self.dispatch(write_entry(cache, invalidations, key, value, ttl, since))
            .await;
    }

    /// Write an entry before returning. Used when a mutation must be visible
    /// to the next read.
    pub async fn store(&self, key: String, value: String, ttl: Duration, since: Epoch) {
        write_entry(
            self.cache.clone(),
            self.invalidations.clone(),
            key,
            value,
            ttl,
            since,
        )
        .await;
    }

    pub async fn broadcast(&self, menu_id: Uuid, event: MenuEvent, payload: Value) {
        let broadcaster = self.broadcaster.clone();
        self.dispatch(async move {
            let channel = menu_channel(menu_id);
            if let Err(err) = broadcaster.publish(&channel, event.as_str(), &payload).await {
                counter!("menuqr_broadcast_failure_total", "event" => event.as_str())
                    .increment(1);
                warn!(
                    target = "menuqr::realtime",
                    channel = %channel,
                    event = event.as_str(),
                    error = %err,
                    "broadcast failed"
                );
            }
        })
        .await;
    }

    async fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.mode {
            DispatchMode::Background => {
                tokio::spawn(task);
            }
            DispatchMode::Inline => task.await,
        }
    }
}

async fn write_entry(
    cache: Arc<dyn MenuCache>,
    invalidations: Arc<Invalidations>,
    key: String,
    value: String,
    ttl: Duration,
    since: Epoch,
) {
    if invalidations.is_stale(&key, since) {
        debug!(target = "menuqr::cache", key = %key, "skipping write for invalidated entry");
        return;
    }

    if let Err(err) = cache.set(&key, value, ttl).await {
        counter!("menuqr_cache_error_total", "op" => "set").increment(1);
        warn!(
            target = "menuqr::cache",
            key = %key,
            error = %err,
            "cache population failed"
        );
        return;
    }

    // an invalidation may have run while the write was in flight
    if invalidations.is_stale(&key, since) {
        if let Err(err) = cache.delete(std::slice::from_ref(&key)).await {
            counter!("menuqr_cache_error_total", "op" => "delete").increment(1);
            warn!(
                target = "menuqr::cache",
                key = %key,
                error = %err,
                "failed to drop entry invalidated during write"
            );
        }
        return;
    }

    debug!(target = "menuqr::cache", key = %key, "cache populated");
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::application::realtime::BroadcastError;
    use crate::cache::{CacheError, LocalMenuCache};

    #[derive(Default)]
    struct FailingBroadcaster {
        attempts: Mutex<u32>,
    }

    #[async_trait]
    impl Broadcaster for FailingBroadcaster {
        async fn publish(
            &self,
            _channel: &str,
            _event: &str,
            _payload: &Value,
        ) -> Result<(), BroadcastError> {
            *self.attempts.lock().await += 1;
            Err(BroadcastError::Transport("connection refused".into()))
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl MenuCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("down".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".into()))
        }

        async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let broadcaster = Arc::new(FailingBroadcaster::default());
        let effects = SideEffects::new(
            Arc::new(BrokenCache),
            broadcaster.clone(),
            DispatchMode::Inline,
        );

        effects.invalidate(vec!["k".into()]).await;
        effects
            .populate("k".into(), "v".into(), Duration::from_secs(1), effects.epoch())
            .await;
        effects
            .broadcast(Uuid::new_v4(), MenuEvent::Updated, Value::Null)
            .await;

        assert_eq!(*broadcaster.attempts.lock().await, 1);
    }

    #[tokio::test]
    async fn invalidate_is_visible_immediately() {
        let cache = Arc::new(LocalMenuCache::new(8));
        let effects = SideEffects::new(
            cache.clone(),
            Arc::new(crate::application::realtime::DisabledBroadcaster),
            DispatchMode::Background,
        );
        cache
            .set("k", "v".into(), Duration::from_secs(60))
            .await
            .expect("set");

        effects.invalidate(vec!["k".into()]).await;

        assert!(cache.get("k").await.expect("get").is_none());
    }

    struct SlowCache {
        inner: LocalMenuCache,
        delay: Duration,
    }

    #[async_trait]
    impl MenuCache for SlowCache {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
            tokio::time::sleep(self.delay).await;
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
            self.inner.delete(keys).await
        }
    }

    fn slow_effects() -> (Arc<SlowCache>, SideEffects) {
        let cache = Arc::new(SlowCache {
            inner: LocalMenuCache::new(8),
            delay: Duration::from_millis(20),
        });
        let effects = SideEffects::new(
            cache.clone(),
            Arc::new(crate::application::realtime::DisabledBroadcaster),
            DispatchMode::Background,
        );
        (cache, effects)
    }

    #[tokio::test]
    async fn late_background_write_does_not_outlive_invalidation() {
        let (cache, effects) = slow_effects();
        let key = "menuqr:public:cafe".to_string();

        let since = effects.epoch();
        effects
            .populate(key.clone(), "{published}".into(), Duration::from_secs(3600), since)
            .await;
        effects.invalidate(vec![key.clone()]).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get(&key).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn write_read_before_invalidation_is_skipped() {
        let (cache, effects) = slow_effects();
        let key = "menuqr:public:cafe".to_string();

        let since = effects.epoch();
        effects.invalidate(vec![key.clone()]).await;
        effects
            .store(key.clone(), "{published}".into(), Duration::from_secs(3600), since)
            .await;

        assert!(cache.get(&key).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn store_is_visible_on_return() {
        let (cache, effects) = slow_effects();
        effects.invalidate(vec!["k".into()]).await;

        effects
            .store("k".into(), "v".into(), Duration::from_secs(60), effects.epoch())
            .await;

        assert_eq!(cache.get("k").await.expect("get").as_deref(), Some("v"));
    }
}
