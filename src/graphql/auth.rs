//! Resolver-side access to the authenticated user
//!
//! The adapter only attaches the identity; whether a field requires one is up
//! to the schema. Use `AuthGuard` to require authentication on any operation:
//!
//! ```ignore
//! #[graphql(guard = "AuthGuard")]
//! async fn protected_query(&self, ctx: &Context<'_>) -> Result<String> { ... }
//! ```

use async_graphql::{Context, ErrorExtensions, Result};

use crate::auth::AuthenticatedIdentity;

use super::RequestContext;

/// Extension trait to get the request context and authenticated user from GraphQL context
pub trait AuthExt {
    /// The context built for this request, if the request went through the adapter
    fn request_context(&self) -> Option<&RequestContext>;

    /// Get the authenticated user, or return an error if not authenticated
    fn auth_user(&self) -> Result<&AuthenticatedIdentity>;

    /// Get the authenticated user if present, or None
    fn try_auth_user(&self) -> Option<&AuthenticatedIdentity>;
}

impl<'a> AuthExt for Context<'a> {
    fn request_context(&self) -> Option<&RequestContext> {
        self.data_opt::<RequestContext>()
    }

    fn auth_user(&self) -> Result<&AuthenticatedIdentity> {
        self.try_auth_user().ok_or_else(|| {
            async_graphql::Error::new("Authentication required")
                .extend_with(|_, e| e.set("code", "UNAUTHORIZED"))
        })
    }

    fn try_auth_user(&self) -> Option<&AuthenticatedIdentity> {
        self.request_context().and_then(RequestContext::identity)
    }
}

/// Guard that requires authentication for GraphQL operations.
///
/// Use with `#[graphql(guard = "AuthGuard")]` on queries, mutations, or subscriptions.
pub struct AuthGuard;

impl async_graphql::Guard for AuthGuard {
    fn check(&self, ctx: &Context<'_>) -> impl std::future::Future<Output = Result<()>> + Send {
        let result = ctx.auth_user().map(|_| ());
        async move { result }
    }
}
