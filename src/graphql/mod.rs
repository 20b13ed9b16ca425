//! GraphQL request plumbing
//!
//! Execution itself belongs to async-graphql. This module owns what happens
//! around it: building per-request options and context, formatting errors, and
//! giving resolvers access to the authenticated user.

mod auth;
mod options;

pub use auth::{AuthExt, AuthGuard};
pub use options::{
    ErrorFormatter, ExecutionOptions, OptionsSource, RequestContext, RequestContextBuilder,
    RequestOptions, format_error,
};
