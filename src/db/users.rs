//! Users repository: users and their login tokens.
//!
//! Only hashes of login tokens are stored. The plain token is handed out once by
//! [UsersRepository::issue_login_token] and never persisted.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool as Pool;
use uuid::Uuid;

use crate::auth::{
    LoginToken, LoginTokenMatch, TokenPolicy, UserRecord, UserStore, generate_login_token,
    hash_login_token,
};

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: Option<String>,
    pub profile: serde_json::Value,
}

type UserRow = (String, String, Option<String>, String, String);

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", value, e))
}

fn user_from_row(row: UserRow) -> Result<UserRecord> {
    let (id, username, email, profile, created_at) = row;
    let profile = serde_json::from_str(&profile)
        .with_context(|| format!("Invalid profile JSON for user {}", id))?;
    Ok(UserRecord {
        id,
        username,
        email,
        profile,
        created_at: parse_time(&created_at)?,
    })
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool,
    policy: TokenPolicy,
}

impl UsersRepository {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            policy: TokenPolicy::default(),
        }
    }

    pub fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create a new user
    pub async fn create(&self, user: CreateUser) -> Result<UserRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, username, email, profile, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.profile.to_string())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create user '{}'", user.username))?;

        // Read back so the record carries exactly what is stored.
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| anyhow!("User {} vanished after insert", id))
    }

    /// Get a user by ID
    pub async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, profile, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    /// Get a user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, profile, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(user_from_row).transpose()
    }

    /// Issue a new login token for a user and return the plain token.
    pub async fn issue_login_token(&self, user_id: &str) -> Result<String> {
        let token = generate_login_token();
        self.insert_login_token(user_id, &hash_login_token(&token), Utc::now())
            .await?;
        Ok(token)
    }

    /// Store an already-hashed login token issued at `when`.
    pub async fn insert_login_token(
        &self,
        user_id: &str,
        hashed_token: &str,
        when: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO login_tokens (hashed_token, user_id, issued_at) VALUES (?, ?, ?)")
            .bind(hashed_token)
            .bind(user_id)
            .bind(when.to_rfc3339())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to store login token for user {}", user_id))?;
        Ok(())
    }

    /// Remove a login token. Returns whether it existed.
    pub async fn revoke_login_token(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM login_tokens WHERE hashed_token = ?")
            .bind(hash_login_token(token))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All login tokens of a user, oldest first
    pub async fn login_tokens(&self, user_id: &str) -> Result<Vec<LoginToken>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT hashed_token, issued_at FROM login_tokens WHERE user_id = ? ORDER BY issued_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(hashed_token, issued_at)| {
                Ok(LoginToken {
                    hashed_token,
                    when: parse_time(&issued_at)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn find_by_hashed_token(&self, hashed_token: &str) -> Result<Option<LoginTokenMatch>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, String, String, String)>(
            r#"
            SELECT u.id, u.username, u.email, u.profile, u.created_at, t.issued_at
            FROM login_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.hashed_token = ?
            "#,
        )
        .bind(hashed_token)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, username, email, profile, created_at, issued_at)) = row else {
            return Ok(None);
        };

        Ok(Some(LoginTokenMatch {
            user: user_from_row((id, username, email, profile, created_at))?,
            login_token: LoginToken {
                hashed_token: hashed_token.to_string(),
                when: parse_time(&issued_at)?,
            },
        }))
    }

    fn token_policy(&self) -> TokenPolicy {
        self.policy
    }
}
