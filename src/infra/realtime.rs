//! Pusher Channels HTTP API client.

use std::time::Duration;

use async_trait::async_trait;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::realtime::{BroadcastError, Broadcaster};
use crate::config::PusherSettings;

use super::error::InfraError;

type HmacSha256 = Hmac<Sha256>;

const AUTH_VERSION: &str = "1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [&'a str; 1],
    /// Pusher expects the event payload as an encoded JSON string.
    data: String,
}

#[derive(Clone)]
pub struct PusherBroadcaster {
    client: Client,
    settings: PusherSettings,
    host: String,
}

impl PusherBroadcaster {
    pub fn new(settings: PusherSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("menuqr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        let host = format!("https://api-{}.pusher.com", settings.cluster);
        Ok(Self {
            client,
            settings,
            host,
        })
    }

    fn events_path(&self) -> String {
        format!("/apps/{}/events", self.settings.app_id)
    }
}

#[async_trait]
impl Broadcaster for PusherBroadcaster {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &Value,
    ) -> Result<(), BroadcastError> {
        let body = serde_json::to_vec(&TriggerBody {
            name: event,
            channels: [channel],
            data: serde_json::to_string(payload)?,
        })?;

        let path = self.events_path();
        let query = signed_query(
            &self.settings.key,
            &self.settings.secret,
            &path,
            &body,
            OffsetDateTime::now_utc().unix_timestamp(),
        )
        .map_err(|err| BroadcastError::Transport(format!("invalid signing secret: {err}")))?;

        let response = self
            .client
            .post(format!("{}{path}?{query}", self.host))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| BroadcastError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BroadcastError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(target = "menuqr::realtime", channel, event, "event delivered");
        Ok(())
    }
}

/// Build the authenticated query string for a Pusher REST call.
///
/// The signature covers `METHOD\nPATH\nQUERY`, where QUERY lists every
/// parameter except the signature in key order.
fn signed_query(
    key: &str,
    secret: &str,
    path: &str,
    body: &[u8],
    timestamp: i64,
) -> Result<String, InvalidLength> {
    let body_md5 = hex::encode(Md5::digest(body));
    let params = [
        ("auth_key", key.to_string()),
        ("auth_timestamp", timestamp.to_string()),
        ("auth_version", AUTH_VERSION.to_string()),
        ("body_md5", body_md5),
    ];
    let query = params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let to_sign = format!("POST\n{path}\n{query}");
    let signature = sign(secret, to_sign.as_bytes())?;
    Ok(format!("{query}&auth_signature={signature}"))
}

fn sign(secret: &str, payload: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
