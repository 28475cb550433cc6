//! Image uploads forwarded to the external image host.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::histogram;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::application::auth::AuthUser;
use crate::application::error::ServiceError;

const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];
const MAX_FOLDER_CHARS: usize = 64;

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("image host request failed: {0}")]
    Transport(String),
    #[error("image host rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("image host response was malformed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: String,
    /// Fully-qualified destination folder.
    pub folder: String,
    pub preset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub bytes: u64,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<UploadedImage, ImageHostError>;
}

/// What the caller sent, before validation.
#[derive(Debug, Clone)]
pub struct UploadCommand {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub folder: Option<String>,
    pub preset: Option<String>,
}

#[derive(Clone)]
pub struct UploadService {
    host: Option<Arc<dyn ImageHost>>,
    root_folder: String,
    max_bytes: usize,
}

impl UploadService {
    /// `host` is `None` when no image host is configured; uploads then fail
    /// with a not-configured error.
    pub fn new(host: Option<Arc<dyn ImageHost>>, root_folder: String, max_bytes: usize) -> Self {
        Self {
            host,
            root_folder,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn upload(
        &self,
        principal: &AuthUser,
        command: UploadCommand,
    ) -> Result<UploadedImage, ServiceError> {
        let host = self.host.as_ref().ok_or(ServiceError::NotConfigured {
            service: "image uploads",
        })?;

        if command.bytes.is_empty() {
            return Err(field_error("file", "file is empty"));
        }
        if command.bytes.len() > self.max_bytes {
            return Err(field_error(
                "file",
                format!("file exceeds {} bytes", self.max_bytes),
            ));
        }

        let file_name = command
            .file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = resolve_content_type(command.content_type.as_deref(), &file_name)?;
        let folder = self.destination(principal, command.folder.as_deref())?;

        let started = Instant::now();
        let uploaded = host
            .upload(ImageUpload {
                bytes: command.bytes,
                file_name,
                content_type,
                folder,
                preset: command.preset.filter(|preset| !preset.trim().is_empty()),
            })
            .await
            .map_err(|err| ServiceError::upstream("image host", err))?;
        histogram!("menuqr_upload_duration_seconds").record(started.elapsed().as_secs_f64());

        info!(
            target = "menuqr::uploads",
            user_id = %principal.id,
            public_id = %uploaded.public_id,
            bytes = uploaded.bytes,
            "image uploaded"
        );
        Ok(uploaded)
    }

    /// `{root}/{user_id}[/{folder}]`, keeping every tenant in its own prefix.
    fn destination(&self, principal: &AuthUser, folder: Option<&str>) -> Result<String, ServiceError> {
        let base = format!("{}/{}", self.root_folder.trim_matches('/'), principal.id);
        match folder.map(str::trim).filter(|folder| !folder.is_empty()) {
            None => Ok(base),
            Some(folder) => {
                let folder = sanitize_folder(folder)?;
                Ok(format!("{base}/{folder}"))
            }
        }
    }
}

fn resolve_content_type(declared: Option<&str>, file_name: &str) -> Result<String, ServiceError> {
    let content_type = declared
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value != "application/octet-stream")
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    if ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        Ok(content_type)
    } else {
        Err(field_error(
            "file",
            format!("unsupported content type `{content_type}`"),
        ))
    }
}

fn sanitize_folder(folder: &str) -> Result<String, ServiceError> {
    let folder = folder.trim_matches('/');
    let valid = folder.len() <= MAX_FOLDER_CHARS
        && folder.split('/').all(|segment| {
            !segment.is_empty()
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if valid {
        Ok(folder.to_ascii_lowercase())
    } else {
        Err(field_error(
            "folder",
            "folder may only contain letters, digits, '-', '_' and '/'",
        ))
    }
}

fn field_error(field: &'static str, message: impl Into<String>) -> ServiceError {
    let message = message.into();
    ServiceError::validation_with(message.clone(), json!({ field: [message] }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingHost {
        seen: Mutex<Vec<ImageUpload>>,
    }

    #[async_trait]
    impl ImageHost for RecordingHost {
        async fn upload(&self, image: ImageUpload) -> Result<UploadedImage, ImageHostError> {
            let uploaded = UploadedImage {
                url: format!("https://img.example/{}/{}", image.folder, image.file_name),
                public_id: format!("{}/{}", image.folder, image.file_name),
                width: None,
                height: None,
                bytes: image.bytes.len() as u64,
            };
            self.seen.lock().expect("lock").push(image);
            Ok(uploaded)
        }
    }

    fn principal() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
        }
    }

    fn command(bytes: &'static [u8], content_type: Option<&str>) -> UploadCommand {
        UploadCommand {
            bytes: Bytes::from_static(bytes),
            file_name: Some("logo.png".into()),
            content_type: content_type.map(str::to_string),
            folder: Some("logos".into()),
            preset: None,
        }
    }

    #[tokio::test]
    async fn uploads_land_in_tenant_folder() {
        let host = Arc::new(RecordingHost::default());
        let service = UploadService::new(Some(host.clone()), "menuqr".into(), 1024);
        let user = principal();

        let uploaded = service
            .upload(&user, command(b"\x89PNG", Some("image/png")))
            .await
            .expect("upload");

        assert_eq!(uploaded.bytes, 4);
        let seen = host.seen.lock().expect("lock");
        assert_eq!(seen[0].folder, format!("menuqr/{}/logos", user.id));
        assert_eq!(seen[0].content_type, "image/png");
    }

    #[tokio::test]
    async fn rejects_non_images_and_oversized_files() {
        let service = UploadService::new(
            Some(Arc::new(RecordingHost::default())),
            "menuqr".into(),
            4,
        );
        let user = principal();

        let err = service
            .upload(&user, command(b"%PDF", Some("application/pdf")))
            .await
            .expect_err("pdf");
        assert!(matches!(err, ServiceError::Validation { .. }));

        let err = service
            .upload(&user, command(b"\x89PNG-too-big", Some("image/png")))
            .await
            .expect_err("size");
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_host_is_not_configured() {
        let service = UploadService::new(None, "menuqr".into(), 1024);
        let err = service
            .upload(&principal(), command(b"\x89PNG", Some("image/png")))
            .await
            .expect_err("no host");
        assert!(matches!(err, ServiceError::NotConfigured { .. }));
    }

    #[test]
    fn content_type_falls_back_to_extension() {
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "cover.webp").expect("webp"),
            "image/webp"
        );
        assert_eq!(
            resolve_content_type(None, "photo.JPG").expect("jpeg"),
            "image/jpeg"
        );
    }

    #[test]
    fn folder_rejects_traversal() {
        assert!(sanitize_folder("../etc").is_err());
        assert!(sanitize_folder("menus/covers").is_ok());
        assert!(sanitize_folder("bad folder").is_err());
    }
}
