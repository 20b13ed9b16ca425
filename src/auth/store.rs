//! User store collaborator: where login tokens are looked up.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::TokenPolicy;

/// A user as held by the store. Attached in full to authenticated requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub profile: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One stored login token. Only the hash of the token is ever kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
    pub hashed_token: String,
    /// When the token was issued; the expiry is derived from this.
    pub when: DateTime<Utc>,
}

/// A user together with the login token entry that matched the lookup.
///
/// Stores return the matched entry alongside the user, so callers never have
/// to search the user's token collection again.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginTokenMatch {
    pub user: UserRecord,
    pub login_token: LoginToken,
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Find the user owning a login token with this hash. At most one user matches.
    async fn find_by_hashed_token(&self, hashed_token: &str) -> Result<Option<LoginTokenMatch>>;

    /// Lifetime policy applied to tokens of this store.
    fn token_policy(&self) -> TokenPolicy {
        TokenPolicy::default()
    }
}
