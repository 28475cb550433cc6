//! Credential registration, login and bearer-token verification.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::error::{Conflict, Resource, ServiceError};
use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::SubscriptionPlan;

const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";

/// Authenticated caller resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub user: UserRecord,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

/// Emails are compared and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        jwt_secret: &str,
        token_ttl: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_ttl,
            bcrypt_cost,
        }
    }

    pub async fn register(&self, command: RegisterCommand) -> Result<UserRecord, ServiceError> {
        let email = normalize_email(&command.email);
        let password_hash = self.hash_password(command.password).await?;

        let params = CreateUserParams {
            name: command.name.trim().to_string(),
            email,
            password_hash,
            plan: SubscriptionPlan::Free,
        };

        let user = self
            .users
            .create_user(params)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { constraint } if constraint == USERS_EMAIL_CONSTRAINT => {
                    ServiceError::Conflict(Conflict::EmailExists)
                }
                other => ServiceError::from(other),
            })?;

        info!(target = "menuqr::auth", user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn login(&self, command: LoginCommand) -> Result<AuthSession, ServiceError> {
        let email = normalize_email(&command.email);
        let credentials = self
            .users
            .find_credentials_by_email(&email)
            .await?
            .ok_or(ServiceError::Unauthorized)?;

        let hash = credentials.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(command.password, &hash))
            .await
            .map_err(ServiceError::internal)?
            .map_err(ServiceError::internal)?;
        if !verified {
            return Err(ServiceError::Unauthorized);
        }

        let (token, expires_at) = self.issue_token(&credentials.user)?;
        Ok(AuthSession {
            token,
            expires_at,
            user: credentials.user,
        })
    }

    /// Resolve a bearer token into the calling user.
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| ServiceError::Unauthorized)?;
        let id = Uuid::parse_str(&data.claims.sub).map_err(|_| ServiceError::Unauthorized)?;
        Ok(AuthUser {
            id,
            email: data.claims.email,
        })
    }

    pub async fn current_user(&self, principal: &AuthUser) -> Result<UserRecord, ServiceError> {
        self.users
            .find_user(principal.id)
            .await?
            .ok_or(ServiceError::NotFound(Resource::User))
    }

    pub fn issue_token(&self, user: &UserRecord) -> Result<(String, OffsetDateTime), ServiceError> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.token_ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(ServiceError::internal)?;
        Ok((token, expires_at))
    }

    async fn hash_password(&self, password: String) -> Result<String, ServiceError> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(ServiceError::internal)?
            .map_err(ServiceError::internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::domain::entities::UserCredentials;

    #[derive(Default)]
    struct MemoryUsers {
        rows: Mutex<Vec<UserCredentials>>,
    }

    #[async_trait]
    impl UsersRepo for MemoryUsers {
        async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
            let mut rows = self.rows.lock().await;
            if rows.iter().any(|row| row.user.email == params.email) {
                return Err(RepoError::Duplicate {
                    constraint: USERS_EMAIL_CONSTRAINT.to_string(),
                });
            }
            let now = OffsetDateTime::now_utc();
            let user = UserRecord {
                id: Uuid::new_v4(),
                name: params.name,
                email: params.email,
                plan: params.plan,
                created_at: now,
                updated_at: now,
            };
            rows.push(UserCredentials {
                user: user.clone(),
                password_hash: params.password_hash,
            });
            Ok(user)
        }

        async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
            let rows = self.rows.lock().await;
            Ok(rows.iter().find(|row| row.user.id == id).map(|row| row.user.clone()))
        }

        async fn find_credentials_by_email(
            &self,
            email: &str,
        ) -> Result<Option<UserCredentials>, RepoError> {
            let rows = self.rows.lock().await;
            Ok(rows.iter().find(|row| row.user.email == email).cloned())
        }
    }

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryUsers::default()),
            "test-secret-with-enough-entropy",
            Duration::from_secs(3600),
            4,
        )
    }

    fn register(email: &str) -> RegisterCommand {
        RegisterCommand {
            name: "Ada".into(),
            email: email.into(),
            password: "correct horse battery".into(),
        }
    }

    #[tokio::test]
    async fn register_normalizes_email() {
        let auth = service();
        let user = auth
            .register(register("  Ada@Example.COM "))
            .await
            .expect("registered");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.plan, SubscriptionPlan::Free);
    }

    #[tokio::test]
    async fn duplicate_normalized_email_conflicts() {
        let auth = service();
        auth.register(register("ada@example.com"))
            .await
            .expect("first registration");
        let err = auth
            .register(register("ADA@example.com"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, ServiceError::Conflict(Conflict::EmailExists)));
    }

    #[tokio::test]
    async fn login_issues_a_verifiable_token() {
        let auth = service();
        let user = auth
            .register(register("ada@example.com"))
            .await
            .expect("registered");

        let session = auth
            .login(LoginCommand {
                email: "ADA@example.com".into(),
                password: "correct horse battery".into(),
            })
            .await
            .expect("login");

        let principal = auth.authenticate(&session.token).expect("valid token");
        assert_eq!(principal.id, user.id);
        assert_eq!(principal.email, "ada@example.com");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let auth = service();
        auth.register(register("ada@example.com"))
            .await
            .expect("registered");

        let err = auth
            .login(LoginCommand {
                email: "ada@example.com".into(),
                password: "wrong password".into(),
            })
            .await
            .expect_err("rejected");
        assert!(matches!(err, ServiceError::Unauthorized));
    }

    #[test]
    fn garbage_tokens_are_unauthorized() {
        assert!(matches!(
            service().authenticate("not-a-jwt"),
            Err(ServiceError::Unauthorized)
        ));
    }
}
