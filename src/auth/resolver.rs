//! Resolves an `Authorization` value into an authenticated identity.
//!
//! Missing, unknown and expired tokens all resolve to anonymous (`None`). Only
//! malformed input and store failures are errors.

use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::store::{UserRecord, UserStore};
use super::token::hash_login_token;

/// The user behind a valid, unexpired login token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub user: UserRecord,
}

#[derive(Clone)]
pub struct AuthResolver {
    store: Arc<dyn UserStore>,
}

impl AuthResolver {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve the raw `Authorization` header of an HTTP request.
    pub async fn resolve_header(
        &self,
        header: Option<&HeaderValue>,
    ) -> Result<Option<AuthenticatedIdentity>> {
        let token = header
            .map(|value| {
                value.to_str().map_err(|_| {
                    Error::InvalidInput("Authorization header must be a string".to_string())
                })
            })
            .transpose()?;
        self.resolve(token).await
    }

    /// Resolve an `Authorization` entry of a JSON payload (WebSocket `connection_init`).
    pub async fn resolve_json(
        &self,
        value: Option<&serde_json::Value>,
    ) -> Result<Option<AuthenticatedIdentity>> {
        let token = match value {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(token)) => Some(token.as_str()),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "Authorization must be a string".to_string(),
                ));
            }
        };
        self.resolve(token).await
    }

    pub async fn resolve(&self, token: Option<&str>) -> Result<Option<AuthenticatedIdentity>> {
        self.resolve_at(token, Utc::now()).await
    }

    /// Resolve `token` with expiry checked against `now`.
    pub async fn resolve_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthenticatedIdentity>> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let hashed_token = hash_login_token(token);
        let Some(found) = self
            .store
            .find_by_hashed_token(&hashed_token)
            .await
            .map_err(Error::Store)?
        else {
            debug!("No user owns the presented login token");
            return Ok(None);
        };

        let policy = self.store.token_policy();
        if policy.is_expired(found.login_token.when, now) {
            debug!(
                user_id = %found.user.id,
                expired_at = %policy.expires_at(found.login_token.when),
                "Login token expired"
            );
            return Ok(None);
        }

        Ok(Some(AuthenticatedIdentity {
            user_id: found.user.id.clone(),
            user: found.user,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::auth::store::{LoginToken, LoginTokenMatch};
    use crate::auth::token::TokenPolicy;

    #[derive(Default)]
    struct FixedStore {
        tokens: HashMap<String, LoginTokenMatch>,
    }

    impl FixedStore {
        fn with_token(mut self, user_id: &str, token: &str, when: DateTime<Utc>) -> Self {
            let hashed_token = hash_login_token(token);
            self.tokens.insert(
                hashed_token.clone(),
                LoginTokenMatch {
                    user: user(user_id),
                    login_token: LoginToken { hashed_token, when },
                },
            );
            self
        }
    }

    #[async_trait]
    impl UserStore for FixedStore {
        async fn find_by_hashed_token(
            &self,
            hashed_token: &str,
        ) -> anyhow::Result<Option<LoginTokenMatch>> {
            Ok(self.tokens.get(hashed_token).cloned())
        }

        fn token_policy(&self) -> TokenPolicy {
            TokenPolicy::from_days(1)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn find_by_hashed_token(
            &self,
            _hashed_token: &str,
        ) -> anyhow::Result<Option<LoginTokenMatch>> {
            Err(anyhow::anyhow!("database is locked"))
        }
    }

    fn user(id: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            username: format!("{id}-name"),
            email: None,
            profile: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    fn resolver(store: impl UserStore) -> AuthResolver {
        AuthResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_missing_token_is_anonymous() {
        let resolver = resolver(FixedStore::default());
        assert_matches!(resolver.resolve(None).await, Ok(None));
        assert_matches!(resolver.resolve(Some("")).await, Ok(None));
        assert_matches!(resolver.resolve_header(None).await, Ok(None));
    }

    #[tokio::test]
    async fn test_unknown_token_is_anonymous() {
        let resolver = resolver(FixedStore::default().with_token("u1", "valid", Utc::now()));
        assert_matches!(resolver.resolve(Some("abc123")).await, Ok(None));
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let resolver = resolver(FixedStore::default().with_token("u1", "valid", Utc::now()));
        let identity = resolver.resolve(Some("valid")).await.unwrap().unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.user.id, "u1");
        assert_eq!(identity.user.username, "u1-name");
    }

    #[tokio::test]
    async fn test_expired_token_is_anonymous() {
        let issued = Utc::now() - Duration::days(2);
        let resolver = resolver(FixedStore::default().with_token("u1", "old", issued));
        assert_matches!(resolver.resolve(Some("old")).await, Ok(None));

        // Still valid right up to the expiry instant.
        let at_expiry = issued + Duration::days(1);
        assert_matches!(resolver.resolve_at(Some("old"), at_expiry).await, Ok(Some(_)));
    }

    #[tokio::test]
    async fn test_non_string_header_is_invalid_input() {
        let resolver = resolver(FixedStore::default());
        let header = HeaderValue::from_bytes(b"caf\xe9").unwrap();
        assert_matches!(
            resolver.resolve_header(Some(&header)).await,
            Err(Error::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn test_json_authorization() {
        let resolver = resolver(FixedStore::default().with_token("u2", "tok", Utc::now()));
        let token = serde_json::json!("tok");
        let identity = resolver.resolve_json(Some(&token)).await.unwrap();
        assert_eq!(identity.map(|i| i.user_id).as_deref(), Some("u2"));

        assert_matches!(
            resolver.resolve_json(Some(&serde_json::Value::Null)).await,
            Ok(None)
        );
        assert_matches!(
            resolver.resolve_json(Some(&serde_json::json!(42))).await,
            Err(Error::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let resolver = resolver(BrokenStore);
        assert_matches!(resolver.resolve(Some("tok")).await, Err(Error::Store(_)));
    }
}
