//! Request extractors and the success envelope.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use super::error::ApiError;

/// `Path` with rejections rendered as the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `Query` with rejections rendered as the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// JSON body whose parse and validation outcome is only surfaced on demand.
///
/// Extraction never rejects, so a handler can establish ownership before it
/// reports anything about the payload.
#[derive(Debug)]
pub struct JsonBody<T>(Result<T, ApiError>);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let parsed = Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| value)
            .map_err(ApiError::from);
        Ok(Self(parsed))
    }
}

impl<T: Validate> JsonBody<T> {
    pub fn validated(self) -> Result<T, ApiError> {
        let value = self.0?;
        value.validate().map_err(validation_error)?;
        Ok(value)
    }
}

pub fn validation_error(errors: ValidationErrors) -> ApiError {
    let mut fields = BTreeMap::new();
    collect_errors("", &errors, &mut fields);
    let message = match fields.keys().next() {
        Some(first) if fields.len() == 1 => format!("invalid value for `{first}`"),
        _ => "request validation failed".to_string(),
    };
    ApiError::validation(message).with_details(json!(fields))
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let name = camel_case(field);
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = list
                    .iter()
                    .map(|error| {
                        error
                            .message
                            .as_ref()
                            .map(|message| message.to_string())
                            .unwrap_or_else(|| format!("failed `{}` check", error.code))
                    })
                    .collect::<Vec<_>>();
                out.entry(path).or_default().extend(messages);
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_errors(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct SuccessBody<T> {
    success: bool,
    data: T,
}

/// `{ success: true, data }` with a chosen status.
#[derive(Debug)]
pub struct ApiSuccess<T> {
    status: StatusCode,
    data: T,
}

impl<T> ApiSuccess<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(SuccessBody {
                success: true,
                data: self.data,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, Validate)]
    struct Item {
        #[validate(range(min = 0, message = "must not be negative"))]
        sort_order: i32,
    }

    #[derive(Debug, Serialize, Deserialize, Validate)]
    struct Batch {
        #[validate(length(min = 1), nested)]
        items: Vec<Item>,
    }

    fn request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[test]
    fn camel_case_converts_snake_fields() {
        assert_eq!(camel_case("sort_order"), "sortOrder");
        assert_eq!(camel_case("name"), "name");
    }

    #[tokio::test]
    async fn malformed_json_is_deferred() {
        let JsonBody(parsed) = JsonBody::<Batch>::from_request(request("{"), &())
            .await
            .expect("infallible");
        let err = parsed.expect_err("malformed");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn nested_errors_are_reported_with_paths() {
        let body = JsonBody::<Batch>::from_request(
            request(r#"{"items":[{"sort_order":1},{"sort_order":-2}]}"#),
            &(),
        )
        .await
        .expect("infallible");
        let err = body.validated().expect_err("invalid");
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let response = err.into_response();
        let bytes = http_body_util::BodyExt::collect(response.into_body())
            .await
            .expect("body")
            .to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(
            json["error"]["details"]["items[1].sortOrder"][0],
            "must not be negative"
        );
    }
}
