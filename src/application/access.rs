//! Ownership checks shared by every owner-gated operation.

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::application::auth::AuthUser;
use crate::application::error::{Resource, ServiceError};
use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::plans::{PlanPolicy, policy};

/// Proof that the caller owns a menu. Only obtainable through
/// [`crate::application::menus::MenuService::authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuAccess {
    menu_id: Uuid,
    owner_id: Uuid,
}

impl MenuAccess {
    pub(crate) fn granted(menu_id: Uuid, owner_id: Uuid) -> Self {
        Self { menu_id, owner_id }
    }

    pub fn menu_id(&self) -> Uuid {
        self.menu_id
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// Resolves the caller's current subscription policy.
#[derive(Clone)]
pub struct PlanGate {
    users: Arc<dyn UsersRepo>,
}

impl PlanGate {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    pub async fn policy_for(&self, user_id: Uuid) -> Result<&'static PlanPolicy, ServiceError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(ServiceError::Unauthorized)?;
        Ok(policy(user.plan))
    }
}

/// Gate an operation on the caller owning the target resource.
///
/// `load_owner` resolves the owning user id of the target, or `None` when the
/// target does not exist. Missing targets map to `NotFound(resource)`; a
/// different owner maps to `Forbidden`. The two stay distinguished.
pub async fn ensure_owner<F, Fut>(
    principal: &AuthUser,
    resource: Resource,
    load_owner: F,
) -> Result<(), ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<Uuid>, RepoError>>,
{
    match load_owner().await? {
        None => Err(ServiceError::NotFound(resource)),
        Some(owner) if owner == principal.id => Ok(()),
        Some(_) => Err(ServiceError::Forbidden(
            "you do not have access to this resource",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
        }
    }

    #[tokio::test]
    async fn owner_passes() {
        let user = principal();
        let owner = user.id;
        ensure_owner(&user, Resource::Menu, || async move { Ok(Some(owner)) })
            .await
            .expect("owner allowed");
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let err = ensure_owner(&principal(), Resource::Menu, || async { Ok(None) })
            .await
            .expect_err("missing");
        assert!(matches!(err, ServiceError::NotFound(Resource::Menu)));
    }

    #[tokio::test]
    async fn other_owner_is_forbidden() {
        let err = ensure_owner(&principal(), Resource::Menu, || async {
            Ok(Some(Uuid::new_v4()))
        })
        .await
        .expect_err("foreign");
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
