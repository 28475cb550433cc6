use thiserror::Error;

use crate::domain::plans::{PlanFeature, PlanResource};
use crate::domain::types::SubscriptionPlan;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("a menu needs at least one category before it can be published")]
    EmptyMenu,
    #[error("the {plan} plan allows at most {limit} {resource}")]
    PlanLimitReached {
        plan: SubscriptionPlan,
        resource: PlanResource,
        limit: u32,
    },
    #[error("the {plan} plan does not include {feature}")]
    FeatureUnavailable {
        plan: SubscriptionPlan,
        feature: PlanFeature,
    },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
