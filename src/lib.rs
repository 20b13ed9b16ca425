//! GraphQL mount adapter
//!
//! Mounts an async-graphql executor onto an axum application:
//! - a GraphQL-over-HTTP endpoint with login-token authentication
//! - an optional GraphiQL explorer
//! - an auxiliary WebSocket listener for subscriptions
//!
//! Start with [GraphqlServer].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod graphql;
pub mod http;
pub mod server;
pub mod subscriptions;

pub use config::{ConfigOverrides, ServerConfig};
pub use error::{Error, Result};
pub use server::{GraphqlServer, MountedServer};
