//! Adapter configuration: defaults, caller overrides and the merge between them.
//!
//! [ServerConfig::defaults] builds a fresh record on every call; nothing here is
//! process-global. [ServerConfig::merge] is a shallow merge of the top-level
//! options with a second shallow merge for [ExplorerDisplayOptions], so a caller
//! can change one display hint without losing the others.

mod app;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};

pub use app::AppConfig;

pub const DEFAULT_PATH: &str = "/graphql";
pub const DEFAULT_EXPLORER_PATH: &str = "/graphiql";
pub const DEFAULT_SUBSCRIPTION_PORT: u16 = 8080;
pub const DEFAULT_MAX_ACCOUNTS_CACHE_SIZE_MB: u32 = 1;

/// Header the explorer forwards by default, and where the browser keeps its value.
pub const DEFAULT_PASS_HEADER: &str = "Authorization";
pub const DEFAULT_TOKEN_STORAGE_KEY: &str = "Meteor.loginToken";

/// Callback invoked with the host router before the GraphQL routes are registered.
///
/// Whatever it returns is the router the GraphQL routes are merged into.
#[derive(Clone)]
pub struct ConfigureServer(Arc<dyn Fn(Router) -> Router + Send + Sync>);

impl ConfigureServer {
    pub fn new(f: impl Fn(Router) -> Router + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, router: Router) -> Router {
        (self.0)(router)
    }
}

impl Default for ConfigureServer {
    fn default() -> Self {
        Self::new(|router| router)
    }
}

impl fmt::Debug for ConfigureServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfigureServer(..)")
    }
}

/// Two callbacks are equal when they are the same allocation.
impl PartialEq for ConfigureServer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Header the explorer copies from browser local storage into every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassHeader {
    pub header: String,
    pub storage_key: String,
}

/// Display hints handed to the explorer page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExplorerDisplayOptions {
    pub title: Option<String>,
    pub pass_header: Option<PassHeader>,
    /// Static headers sent with every explorer request.
    pub headers: BTreeMap<String, String>,
}

impl ExplorerDisplayOptions {
    pub fn defaults() -> Self {
        Self {
            title: None,
            pass_header: Some(PassHeader {
                header: DEFAULT_PASS_HEADER.to_string(),
                storage_key: DEFAULT_TOKEN_STORAGE_KEY.to_string(),
            }),
            headers: BTreeMap::new(),
        }
    }

    /// Shallow merge: every hint set in `overrides` wins, the rest is kept.
    pub fn merge(mut self, overrides: ExplorerDisplayOptions) -> Self {
        if overrides.title.is_some() {
            self.title = overrides.title;
        }
        if overrides.pass_header.is_some() {
            self.pass_header = overrides.pass_header;
        }
        self.headers.extend(overrides.headers);
        self
    }
}

/// The effective configuration. Built once at setup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Route of the GraphQL endpoint.
    pub path: String,
    /// Sizing hint for an accounts cache. Carried for compatibility, no cache reads it.
    pub max_accounts_cache_size_mb: u32,
    pub explorer_enabled: bool,
    pub explorer_path: String,
    pub explorer_display_options: ExplorerDisplayOptions,
    pub use_subscription: bool,
    pub subscription_port: u16,
    /// Development mode: turns on `debug` for requests and the explorer by default.
    pub development: bool,
    pub configure_server: ConfigureServer,
}

impl ServerConfig {
    pub fn defaults(development: bool) -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            max_accounts_cache_size_mb: DEFAULT_MAX_ACCOUNTS_CACHE_SIZE_MB,
            explorer_enabled: development,
            explorer_path: DEFAULT_EXPLORER_PATH.to_string(),
            explorer_display_options: ExplorerDisplayOptions::defaults(),
            use_subscription: true,
            subscription_port: DEFAULT_SUBSCRIPTION_PORT,
            development,
            configure_server: ConfigureServer::default(),
        }
    }

    /// Merge `overrides` over `base`. No validation; unset options keep the base value.
    pub fn merge(base: ServerConfig, overrides: ConfigOverrides) -> ServerConfig {
        let ConfigOverrides {
            path,
            max_accounts_cache_size_mb,
            explorer_enabled,
            explorer_path,
            explorer_display_options,
            use_subscription,
            subscription_port,
            development,
            configure_server,
        } = overrides;

        ServerConfig {
            path: path.unwrap_or(base.path),
            max_accounts_cache_size_mb: max_accounts_cache_size_mb
                .unwrap_or(base.max_accounts_cache_size_mb),
            explorer_enabled: explorer_enabled.unwrap_or(base.explorer_enabled),
            explorer_path: explorer_path.unwrap_or(base.explorer_path),
            explorer_display_options: match explorer_display_options {
                Some(display) => base.explorer_display_options.merge(display),
                None => base.explorer_display_options,
            },
            use_subscription: use_subscription.unwrap_or(base.use_subscription),
            subscription_port: subscription_port.unwrap_or(base.subscription_port),
            development: development.unwrap_or(base.development),
            configure_server: configure_server.unwrap_or(base.configure_server),
        }
    }

    /// Defaults for `development`, with `overrides` merged on top.
    pub fn from_overrides(development: bool, overrides: ConfigOverrides) -> ServerConfig {
        Self::merge(Self::defaults(development), overrides)
    }
}

/// Caller-supplied configuration. Every option is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub path: Option<String>,
    #[serde(rename = "maxAccountsCacheSizeInMB")]
    pub max_accounts_cache_size_mb: Option<u32>,
    pub explorer_enabled: Option<bool>,
    pub explorer_path: Option<String>,
    pub explorer_display_options: Option<ExplorerDisplayOptions>,
    pub use_subscription: Option<bool>,
    pub subscription_port: Option<u16>,
    pub development: Option<bool>,
    #[serde(skip)]
    pub configure_server: Option<ConfigureServer>,
}

impl From<ServerConfig> for ConfigOverrides {
    fn from(config: ServerConfig) -> Self {
        Self {
            path: Some(config.path),
            max_accounts_cache_size_mb: Some(config.max_accounts_cache_size_mb),
            explorer_enabled: Some(config.explorer_enabled),
            explorer_path: Some(config.explorer_path),
            explorer_display_options: Some(config.explorer_display_options),
            use_subscription: Some(config.use_subscription),
            subscription_port: Some(config.subscription_port),
            development: Some(config.development),
            configure_server: Some(config.configure_server),
        }
    }
}
