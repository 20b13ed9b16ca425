//! Subscription listener: a separate HTTP listener that only hosts the
//! GraphQL WebSocket upgrade.
//!
//! Any plain HTTP request reaching it gets `404 Not Found`. The listener runs in
//! its own task and is independent of the main server; a failure to start it is
//! reported to the caller, which logs it and carries on without subscriptions.

use std::net::SocketAddr;

use async_graphql::{Data, Executor};
use async_graphql_axum::{GraphQLProtocol, GraphQLWebSocket};
use axum::Router;
use axum::extract::{FromRequestParts, Request, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::auth::AuthResolver;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::graphql::{RequestContext, RequestContextBuilder};

const PROTOCOLS: [&str; 2] = ["graphql-transport-ws", "graphql-ws"];

struct SubscriptionState<E> {
    manager: E,
    builder: RequestContextBuilder,
}

impl<E: Clone> Clone for SubscriptionState<E> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            builder: self.builder.clone(),
        }
    }
}

/// Start the subscription listener if `config` asks for one.
///
/// Returns [Error::Configuration] before anything is bound when subscriptions
/// are enabled but no `manager` was supplied.
pub async fn start_subscriptions<E: Executor>(
    config: &ServerConfig,
    manager: Option<E>,
    builder: RequestContextBuilder,
) -> Result<Option<SubscriptionListener>> {
    if !config.use_subscription {
        return Ok(None);
    }
    let manager = manager.ok_or_else(|| {
        Error::Configuration(
            "a subscription manager is required when subscriptions are enabled".to_string(),
        )
    })?;

    SubscriptionListener::start(config.subscription_port, manager, builder)
        .await
        .map(Some)
}

/// Router served by the listener: the WebSocket endpoint at `/`, `404` for everything else.
pub fn router<E: Executor>(manager: E, builder: RequestContextBuilder) -> Router {
    Router::new()
        .route("/", any(subscription_handler::<E>))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(SubscriptionState { manager, builder })
}

/// Handle to a running subscription listener.
#[derive(Debug)]
pub struct SubscriptionListener {
    local_addr: SocketAddr,
    /// JoinHandle for the server task; taken in shutdown().
    join_handle: parking_lot::RwLock<Option<tokio::task::JoinHandle<()>>>,
    /// Send to trigger shutdown; taken in shutdown().
    shutdown_tx: parking_lot::RwLock<Option<broadcast::Sender<()>>>,
}

impl SubscriptionListener {
    /// Bind `port` (0 picks a free port) and serve the subscription endpoint in a background task.
    pub async fn start<E: Executor>(
        port: u16,
        manager: E,
        builder: RequestContextBuilder,
    ) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut shutdown_rx = shutdown_tx.subscribe();

        let serve_fut = axum::serve(listener, router(manager, builder));
        let join = tokio::spawn(async move {
            tokio::select! {
                result = serve_fut => {
                    if let Err(e) = result {
                        error!(service = "subscriptions", error = %e, "Subscription listener failed");
                    }
                }
                _ = shutdown_rx.recv() => {}
            }
        });

        info!(
            service = "subscriptions",
            port = local_addr.port(),
            "Subscription manager running"
        );

        Ok(Self {
            local_addr,
            join_handle: parking_lot::RwLock::new(Some(join)),
            shutdown_tx: parking_lot::RwLock::new(Some(shutdown_tx)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .read()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop accepting connections and wait for the listener task to end.
    pub async fn shutdown(&self) {
        let tx = self.shutdown_tx.write().take();
        let handle = self.join_handle.write().take();
        drop(tx); // dropping the sender unblocks the task's recv
        if let Some(h) = handle {
            let _ = h.await;
        }
        info!(service = "subscriptions", "Subscription listener stopped");
    }
}

async fn subscription_handler<E: Executor>(
    State(state): State<SubscriptionState<E>>,
    request: Request,
) -> Response {
    let (mut parts, _body) = request.into_parts();

    let Ok(upgrade) = WebSocketUpgrade::from_request_parts(&mut parts, &()).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Ok(protocol) = GraphQLProtocol::from_request_parts(&mut parts, &()).await else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let options = match state.builder.build(&parts).await {
        Ok(options) => options,
        Err(e) => return e.into_response(),
    };
    let resolver = state.builder.resolver().clone();
    let manager = state.manager;

    upgrade.protocols(PROTOCOLS).on_upgrade(move |socket| {
        GraphQLWebSocket::new(socket, manager, protocol)
            .on_connection_init(move |params| async move {
                let context = connection_context(&resolver, options.context, &params)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))?;
                let mut data = Data::default();
                data.insert(context);
                Ok::<_, async_graphql::Error>(data)
            })
            .serve()
    })
}

/// Context for a WebSocket connection. An `Authorization` entry in the
/// `connection_init` payload replaces whatever identity the upgrade request's
/// header resolved to, including with anonymous when the entry does not resolve.
async fn connection_context(
    resolver: &AuthResolver,
    mut context: RequestContext,
    params: &serde_json::Value,
) -> Result<RequestContext> {
    let authorization = params
        .get("Authorization")
        .or_else(|| params.get("authorization"));
    if let Some(authorization) = authorization {
        match resolver.resolve_json(Some(authorization)).await? {
            Some(identity) => context.set_identity(identity),
            None => context.clear_identity(),
        }
    }
    Ok(context)
}
