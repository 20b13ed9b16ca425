//! Per-request execution options and the builder that produces them.
//!
//! Every request gets its own [RequestOptions]: the caller's options are cloned
//! (never shared), merged over the defaults, and the identity resolved from the
//! `Authorization` header is attached to a fresh [RequestContext].

use std::fmt;
use std::sync::Arc;

use async_graphql::{Request, Response, ServerError};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::{AuthResolver, AuthenticatedIdentity, UserRecord};
use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Values visible to resolvers through [AuthExt](super::AuthExt).
///
/// Either both `userId` and `user` are present (authenticated) or neither is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(flatten)]
    values: Map<String, Value>,
    #[serde(flatten)]
    identity: Option<AuthenticatedIdentity>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn identity(&self) -> Option<&AuthenticatedIdentity> {
        self.identity.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.user_id.as_str())
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.identity.as_ref().map(|i| &i.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub(crate) fn set_identity(&mut self, identity: AuthenticatedIdentity) {
        self.identity = Some(identity);
    }

    pub(crate) fn clear_identity(&mut self) {
        self.identity = None;
    }
}

/// Maps an execution error to what the client gets to see.
#[derive(Clone)]
pub struct ErrorFormatter(Arc<dyn Fn(ServerError) -> ServerError + Send + Sync>);

impl ErrorFormatter {
    pub fn new(f: impl Fn(ServerError) -> ServerError + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn format(&self, error: ServerError) -> ServerError {
        (self.0)(error)
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new(format_error)
    }
}

impl fmt::Debug for ErrorFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorFormatter(..)")
    }
}

/// Default formatting: keep `message`, `locations` and `path`, drop everything else.
pub fn format_error(mut error: ServerError) -> ServerError {
    error.source = None;
    error.extensions = None;
    error
}

/// Options a caller supplies. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub debug: Option<bool>,
    pub format_error: Option<ErrorFormatter>,
    pub context: Option<RequestContext>,
}

type OptionsProvider = dyn Fn(&Parts) -> anyhow::Result<ExecutionOptions> + Send + Sync;

/// Where execution options come from: a fixed value or a function of the request.
#[derive(Clone)]
pub enum OptionsSource {
    Static(ExecutionOptions),
    Provider(Arc<OptionsProvider>),
}

impl OptionsSource {
    pub fn provider(
        f: impl Fn(&Parts) -> anyhow::Result<ExecutionOptions> + Send + Sync + 'static,
    ) -> Self {
        Self::Provider(Arc::new(f))
    }

    fn options_for(&self, parts: &Parts) -> Result<ExecutionOptions> {
        match self {
            Self::Static(options) => Ok(options.clone()),
            Self::Provider(provider) => provider(parts).map_err(Error::Options),
        }
    }
}

impl Default for OptionsSource {
    fn default() -> Self {
        Self::Static(ExecutionOptions::default())
    }
}

impl From<ExecutionOptions> for OptionsSource {
    fn from(options: ExecutionOptions) -> Self {
        Self::Static(options)
    }
}

impl fmt::Debug for OptionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(options) => f.debug_tuple("Static").field(options).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Fully resolved options for one request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub debug: bool,
    pub format_error: ErrorFormatter,
    pub context: RequestContext,
}

impl RequestOptions {
    /// Attach the request context to a GraphQL request.
    pub fn apply(&self, request: Request) -> Request {
        request.data(self.context.clone())
    }

    /// Log (in debug mode) and format the errors of an executed request.
    pub fn finish(&self, mut response: Response) -> Response {
        if self.debug {
            for error in &response.errors {
                tracing::error!(
                    message = %error.message,
                    path = ?error.path,
                    locations = ?error.locations,
                    "GraphQL execution error"
                );
            }
        }
        response.errors = response
            .errors
            .into_iter()
            .map(|e| self.format_error.format(e))
            .collect();
        response
    }
}

/// Builds [RequestOptions] for each incoming request.
#[derive(Clone)]
pub struct RequestContextBuilder {
    source: OptionsSource,
    resolver: AuthResolver,
    development: bool,
}

impl RequestContextBuilder {
    pub fn new(config: &ServerConfig, source: OptionsSource, resolver: AuthResolver) -> Self {
        Self {
            source,
            resolver,
            development: config.development,
        }
    }

    pub fn resolver(&self) -> &AuthResolver {
        &self.resolver
    }

    /// Resolve options for `parts`. Errors from the options provider or from a
    /// malformed `Authorization` header are returned as is.
    pub async fn build(&self, parts: &Parts) -> Result<RequestOptions> {
        let ExecutionOptions {
            debug,
            format_error,
            context,
        } = self.source.options_for(parts)?;

        let mut context = context.unwrap_or_default();
        if let Some(identity) = self
            .resolver
            .resolve_header(parts.headers.get(AUTHORIZATION))
            .await?
        {
            context.set_identity(identity);
        }

        Ok(RequestOptions {
            debug: debug.unwrap_or(self.development),
            format_error: format_error.unwrap_or_default(),
            context,
        })
    }
}
