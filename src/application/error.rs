use std::error::Error as StdError;
use std::fmt;

use axum::{http::StatusCode, response::Response};
use serde_json::Value;
use thiserror::Error;

use crate::{
    application::repos::RepoError,
    domain::{error::DomainError, slug::SlugError},
    infra::error::InfraError,
};

/// Diagnostic payload attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Owned resources whose absence has a dedicated error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Menu,
    Category,
    Product,
    Variation,
    Promotion,
    User,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Resource::Menu => "menu",
            Resource::Category => "category",
            Resource::Product => "product",
            Resource::Variation => "variation",
            Resource::Promotion => "promotion",
            Resource::User => "user",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    SlugExists,
    EmailExists,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::SlugExists => f.write_str("slug is already taken"),
            Conflict::EmailExists => f.write_str("an account with this email already exists"),
        }
    }
}

/// Failure of an application operation, independent of transport.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("authentication required")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("{0}")]
    Conflict(Conflict),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn upstream(service: &'static str, message: impl fmt::Display) -> Self {
        Self::Upstream {
            service,
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl fmt::Display) -> Self {
        Self::Internal(message.to_string())
    }
}

impl From<SlugError> for ServiceError {
    fn from(error: SlugError) -> Self {
        Self::validation_with(
            error.to_string(),
            serde_json::json!({ "slug": [error.to_string()] }),
        )
    }
}

/// Process-level failure surfaced by the binary entrypoint.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
