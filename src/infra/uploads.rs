//! Cloudinary image host adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::application::uploads::{ImageHost, ImageHostError, ImageUpload, UploadedImage};
use crate::config::CloudinarySettings;

use super::error::InfraError;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    width: Option<u32>,
    height: Option<u32>,
    bytes: Option<u64>,
}

#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    settings: CloudinarySettings,
}

impl CloudinaryClient {
    pub fn new(settings: CloudinarySettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("menuqr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn upload_url(&self) -> String {
        format!("{API_BASE}/{}/image/upload", self.settings.cloud_name)
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, image: ImageUpload) -> Result<UploadedImage, ImageHostError> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp().to_string();

        let mut signed: Vec<(&str, String)> = vec![
            ("folder", image.folder.clone()),
            ("timestamp", timestamp.clone()),
        ];
        if let Some(preset) = &image.preset {
            signed.push(("upload_preset", preset.clone()));
        }
        let signature = sign_params(&signed, &self.settings.api_secret);

        let size = image.bytes.len() as u64;
        let file = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|err| ImageHostError::Transport(err.to_string()))?;

        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.settings.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (name, value) in signed {
            form = form.text(name, value);
        }

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|err| ImageHostError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| ImageHostError::Decode(err.to_string()))?;

        Ok(UploadedImage {
            url: body.secure_url,
            public_id: body.public_id,
            width: body.width,
            height: body.height,
            bytes: body.bytes.unwrap_or(size),
        })
    }
}

/// Cloudinary request signature: the signed parameters sorted by name,
/// joined as `k=v&k=v`, with the API secret appended, hashed with SHA-256.
fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
