use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};

use crate::application::error::{Conflict, ErrorReport, Resource, ServiceError};
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const MENU_NOT_FOUND: &str = "MENU_NOT_FOUND";
    pub const CATEGORY_NOT_FOUND: &str = "CATEGORY_NOT_FOUND";
    pub const PRODUCT_NOT_FOUND: &str = "PRODUCT_NOT_FOUND";
    pub const VARIATION_NOT_FOUND: &str = "VARIATION_NOT_FOUND";
    pub const PROMOTION_NOT_FOUND: &str = "PROMOTION_NOT_FOUND";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const SLUG_EXISTS: &str = "SLUG_EXISTS";
    pub const EMAIL_EXISTS: &str = "EMAIL_EXISTS";
    pub const CONFLICT: &str = "CONFLICT";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

const SOURCE: &str = "menuqr::http";
const INTERNAL_MESSAGE: &str = "an unexpected error occurred";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Error envelope returned by every endpoint.
///
/// `diagnostic` is only logged; clients see `message`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    diagnostic: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            diagnostic: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::VALIDATION_ERROR, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "authentication required",
        )
    }

    pub fn internal(diagnostic: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL_ERROR,
            INTERNAL_MESSAGE,
        )
        .with_diagnostic(diagnostic)
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let mut response = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            codes::RATE_LIMITED,
            "too many requests",
        )
        .with_details(json!({ "retryAfterSeconds": retry_after }))
        .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

fn not_found_code(resource: Resource) -> &'static str {
    match resource {
        Resource::Menu => codes::MENU_NOT_FOUND,
        Resource::Category => codes::CATEGORY_NOT_FOUND,
        Resource::Product => codes::PRODUCT_NOT_FOUND,
        Resource::Variation => codes::VARIATION_NOT_FOUND,
        Resource::Promotion => codes::PROMOTION_NOT_FOUND,
        Resource::User => codes::USER_NOT_FOUND,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::EmptyMenu | DomainError::Validation { .. } => Self::validation(message),
            DomainError::PlanLimitReached {
                plan,
                resource,
                limit,
            } => Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message).with_details(json!({
                "plan": plan.as_str(),
                "resource": resource.to_string(),
                "limit": limit,
            })),
            DomainError::FeatureUnavailable { plan, feature } => {
                Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message).with_details(json!({
                    "plan": plan.as_str(),
                    "feature": feature.to_string(),
                }))
            }
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        let diagnostic = err.to_string();
        match err {
            RepoError::NotFound => {
                Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, "resource not found")
            }
            RepoError::Duplicate { .. } => {
                Self::new(StatusCode::CONFLICT, codes::CONFLICT, "duplicate record")
                    .with_diagnostic(diagnostic)
            }
            RepoError::InvalidInput { .. } => {
                Self::validation("invalid input").with_diagnostic(diagnostic)
            }
            RepoError::ForeignReference { ids } => {
                Self::validation(diagnostic).with_details(json!({ "foreignIds": ids }))
            }
            RepoError::Timeout => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::SERVICE_UNAVAILABLE,
                "database timeout",
            ),
            RepoError::Integrity { .. } | RepoError::Persistence(_) => Self::internal(diagnostic),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized => Self::unauthorized(),
            ServiceError::NotFound(resource) => Self::new(
                StatusCode::NOT_FOUND,
                not_found_code(resource),
                format!("{resource} not found"),
            ),
            ServiceError::Forbidden(message) => {
                Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message)
            }
            ServiceError::Validation { message, details } => {
                let error = Self::validation(message);
                match details {
                    Some(details) => error.with_details(details),
                    None => error,
                }
            }
            ServiceError::Conflict(conflict) => {
                let code = match conflict {
                    Conflict::SlugExists => codes::SLUG_EXISTS,
                    Conflict::EmailExists => codes::EMAIL_EXISTS,
                };
                Self::new(StatusCode::CONFLICT, code, conflict.to_string())
            }
            ServiceError::Domain(err) => err.into(),
            ServiceError::Repo(err) => err.into(),
            ServiceError::NotConfigured { service } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL_ERROR,
                format!("{service} are not configured"),
            ),
            err @ ServiceError::Upstream { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL_ERROR,
                "upstream service request failed",
            )
            .with_diagnostic(err.to_string()),
            ServiceError::Internal(message) => Self::internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("request body is not valid JSON for this endpoint")
            .with_details(json!({ "body": [rejection.body_text()] }))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation("invalid path parameter")
            .with_details(json!({ "path": [rejection.body_text()] }))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation("invalid query string")
            .with_details(json!({ "query": [rejection.body_text()] }))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let diagnostic = self
            .diagnostic
            .clone()
            .unwrap_or_else(|| self.message.clone());
        let body = ApiErrorBody {
            success: false,
            error: ApiErrorMessage {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(SOURCE, self.status, format!("{}: {diagnostic}", self.code))
            .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plans::PlanResource;
    use crate::domain::types::SubscriptionPlan;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn not_found_uses_resource_specific_code() {
        let response = ApiError::from(ServiceError::NotFound(Resource::Category)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "CATEGORY_NOT_FOUND");
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let response = ApiError::from(ServiceError::Repo(RepoError::Persistence(
            "relation \"menus\" does not exist".into(),
        )))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .cloned()
            .expect("report");
        assert!(report.messages[0].contains("relation"));

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn plan_limit_is_forbidden_with_details() {
        let response = ApiError::from(ServiceError::Domain(DomainError::PlanLimitReached {
            plan: SubscriptionPlan::Free,
            resource: PlanResource::Menus,
            limit: 1,
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error"]["details"]["plan"], "FREE");
        assert_eq!(body["error"]["details"]["limit"], 1);
    }

    #[test]
    fn conflicts_map_to_specific_codes() {
        let err = ApiError::from(ServiceError::Conflict(Conflict::EmailExists));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::EMAIL_EXISTS);

        let err = ApiError::from(ServiceError::Domain(DomainError::EmptyMenu));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(30);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).expect("header"),
            "30"
        );
    }
}
