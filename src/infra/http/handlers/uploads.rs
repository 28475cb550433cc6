use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart, State};
use bytes::Bytes;
use serde_json::json;

use crate::application::auth::AuthUser;
use crate::application::uploads::{UploadCommand, UploadedImage};
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::ApiSuccess;
use crate::infra::http::state::AppState;

struct FilePart {
    bytes: Bytes,
    file_name: Option<String>,
    content_type: Option<String>,
}

/// Accept a multipart image (`file`, optional `preset` and `folder`) and
/// forward it to the image host.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiSuccess<UploadedImage>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        ApiError::validation("expected a multipart/form-data body")
            .with_details(json!({ "body": [rejection.body_text()] }))
    })?;

    let mut file = None;
    let mut preset = None;
    let mut folder = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some(FilePart {
                    bytes,
                    file_name,
                    content_type,
                });
            }
            Some("preset") => preset = Some(field.text().await.map_err(multipart_error)?),
            Some("folder") => folder = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let file = file.ok_or_else(|| {
        ApiError::validation("file is required")
            .with_details(json!({ "file": ["file is required"] }))
    })?;

    let uploaded = state
        .uploads
        .upload(
            &user,
            UploadCommand {
                bytes: file.bytes,
                file_name: file.file_name,
                content_type: file.content_type,
                folder: folder.filter(|value| !value.trim().is_empty()),
                preset: preset.filter(|value| !value.trim().is_empty()),
            },
        )
        .await?;

    Ok(ApiSuccess::created(uploaded))
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::validation("invalid multipart payload")
        .with_details(json!({ "file": [err.body_text()] }))
        .with_diagnostic(err.to_string())
}
