//! Demo schema served by the binary.

use std::time::Duration;

use async_graphql::{Context, Json, Object, Result, Schema, SimpleObject, Subscription};
use chrono::{DateTime, Utc};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;

use graphql_mount::auth::UserRecord;
use graphql_mount::db::UsersRepository;
use graphql_mount::graphql::{AuthExt, AuthGuard};

pub type DemoSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

pub fn build_schema(users: UsersRepository) -> DemoSchema {
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(users)
        .finish()
}

#[derive(SimpleObject)]
pub struct User {
    id: String,
    username: String,
    email: Option<String>,
    profile: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<&UserRecord> for User {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            profile: Json(user.profile.clone()),
            created_at: user.created_at,
        }
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn hello(&self, ctx: &Context<'_>) -> String {
        match ctx.try_auth_user() {
            Some(identity) => format!("Hello, {}!", identity.user.username),
            None => "Hello, stranger!".to_string(),
        }
    }

    /// The authenticated user, or null for anonymous requests
    async fn me(&self, ctx: &Context<'_>) -> Option<User> {
        ctx.try_auth_user().map(|identity| User::from(&identity.user))
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Issue an additional login token for the current user
    #[graphql(guard = "AuthGuard")]
    async fn issue_login_token(&self, ctx: &Context<'_>) -> Result<String> {
        let identity = ctx.auth_user()?;
        let users = ctx.data::<UsersRepository>()?;
        Ok(users.issue_login_token(&identity.user_id).await?)
    }
}

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Current server time, every `interval_ms` milliseconds
    async fn clock(
        &self,
        #[graphql(default = 1000)] interval_ms: u64,
    ) -> impl Stream<Item = DateTime<Utc>> {
        let period = Duration::from_millis(interval_ms.max(100));
        IntervalStream::new(tokio::time::interval(period)).map(|_| Utc::now())
    }
}
