//! Outbound real-time notifications.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast transport failed: {0}")]
    Transport(String),
    #[error("broadcast rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("broadcast payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Publishes named events to a channel. Subscribers are out of scope.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, channel: &str, event: &str, payload: &Value)
    -> Result<(), BroadcastError>;
}

/// Used when no real-time provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBroadcaster;

#[async_trait]
impl Broadcaster for DisabledBroadcaster {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        _payload: &Value,
    ) -> Result<(), BroadcastError> {
        debug!(
            target = "menuqr::realtime",
            channel, event, "real-time provider disabled; event dropped"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEvent {
    Published,
    Unpublished,
    Updated,
    Deleted,
    CategoriesReordered,
    ProductsReordered,
    VariationsReordered,
}

impl MenuEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            MenuEvent::Published => "menu-published",
            MenuEvent::Unpublished => "menu-unpublished",
            MenuEvent::Updated => "menu-updated",
            MenuEvent::Deleted => "menu-deleted",
            MenuEvent::CategoriesReordered => "categories-reordered",
            MenuEvent::ProductsReordered => "products-reordered",
            MenuEvent::VariationsReordered => "variations-reordered",
        }
    }
}

pub fn menu_channel(menu_id: Uuid) -> String {
    format!("menu-{menu_id}")
}
