//! Setup entry point: merges configuration, mounts the HTTP routes and starts
//! the subscription listener.

use std::sync::Arc;

use async_graphql::Executor;
use axum::Router;
use tracing::{error, info};

use crate::auth::{AuthResolver, UserStore};
use crate::config::{ConfigOverrides, ServerConfig};
use crate::error::{Error, Result};
use crate::graphql::{OptionsSource, RequestContextBuilder};
use crate::http;
use crate::subscriptions::{SubscriptionListener, start_subscriptions};

/// Builder for mounting a GraphQL executor onto a host router.
///
/// ```ignore
/// let mounted = GraphqlServer::new(schema.clone(), Arc::new(db.users()))
///     .development(true)
///     .subscription_manager(schema)
///     .mount(Router::new())
///     .await?;
/// ```
pub struct GraphqlServer<E> {
    executor: E,
    store: Arc<dyn UserStore>,
    options: OptionsSource,
    overrides: ConfigOverrides,
    development: bool,
    subscription_manager: Option<E>,
}

/// Result of [GraphqlServer::mount].
#[derive(Debug)]
pub struct MountedServer {
    /// The host router with the GraphQL routes merged in.
    pub router: Router,
    /// The configuration that was used.
    pub config: ServerConfig,
    /// The subscription listener, if it was enabled and started.
    pub subscriptions: Option<SubscriptionListener>,
}

impl<E: Executor> GraphqlServer<E> {
    pub fn new(executor: E, store: Arc<dyn UserStore>) -> Self {
        Self {
            executor,
            store,
            options: OptionsSource::default(),
            overrides: ConfigOverrides::default(),
            development: false,
            subscription_manager: None,
        }
    }

    /// Execution options, fixed or computed per request.
    pub fn options(mut self, options: impl Into<OptionsSource>) -> Self {
        self.options = options.into();
        self
    }

    pub fn config(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Environment mode used for the defaults. An explicit `development` override wins.
    pub fn development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Executor serving WebSocket subscriptions. Required when subscriptions are enabled.
    pub fn subscription_manager(mut self, manager: E) -> Self {
        self.subscription_manager = Some(manager);
        self
    }

    /// Mount onto `host`.
    ///
    /// Fails only with [Error::Configuration]: subscriptions enabled with no
    /// manager. Failing to start the listener is logged and the HTTP routes are
    /// still returned.
    pub async fn mount(self, host: Router) -> Result<MountedServer> {
        let development = self.overrides.development.unwrap_or(self.development);
        let config = ServerConfig::from_overrides(development, self.overrides);
        let builder = RequestContextBuilder::new(
            &config,
            self.options,
            AuthResolver::new(self.store),
        );

        let subscriptions =
            match start_subscriptions(&config, self.subscription_manager, builder.clone()).await {
                Ok(listener) => listener,
                Err(e @ Error::Configuration(_)) => return Err(e),
                Err(e) => {
                    error!(
                        service = "graphql",
                        port = config.subscription_port,
                        error = %e,
                        "Failed to start subscription listener"
                    );
                    None
                }
            };

        let router = http::mount(host, &config, self.executor, builder);
        info!(
            service = "graphql",
            path = %config.path,
            explorer = config.explorer_enabled,
            subscriptions = subscriptions.is_some(),
            "GraphQL server ready"
        );

        Ok(MountedServer {
            router,
            config,
            subscriptions,
        })
    }
}
