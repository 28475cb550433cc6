use axum::extract::{Extension, State};

use crate::application::auth::{AuthUser, LoginCommand, RegisterCommand};
use crate::domain::entities::UserRecord;
use crate::infra::http::error::ApiError;
use crate::infra::http::extract::{ApiSuccess, JsonBody};
use crate::infra::http::models::{LoginRequest, RegisterRequest, SessionResponse};
use crate::infra::http::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    body: JsonBody<RegisterRequest>,
) -> Result<ApiSuccess<UserRecord>, ApiError> {
    let request = body.validated()?;
    let user = state
        .auth
        .register(RegisterCommand {
            name: request.name,
            email: request.email,
            password: request.password,
        })
        .await?;
    Ok(ApiSuccess::created(user))
}

pub async fn login(
    State(state): State<AppState>,
    body: JsonBody<LoginRequest>,
) -> Result<ApiSuccess<SessionResponse>, ApiError> {
    let request = body.validated()?;
    let session = state
        .auth
        .login(LoginCommand {
            email: request.email,
            password: request.password,
        })
        .await?;
    Ok(ApiSuccess::ok(session.into()))
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiSuccess<UserRecord>, ApiError> {
    let record = state.auth.current_user(&user).await?;
    Ok(ApiSuccess::ok(record))
}
