//! GraphQL mount demo server
//!
//! Serves the demo schema at the configured GraphQL path, with login-token
//! authentication backed by SQLite. Run with `--create-user <name>` to create a
//! user and print a login token for it.

mod cli;
mod schema;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graphql_mount::GraphqlServer;
use graphql_mount::auth::TokenPolicy;
use graphql_mount::config::AppConfig;
use graphql_mount::db::{CreateUser, Database, UsersRepository};

use crate::cli::CliOptions;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check - always returns OK if the server is running
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn init_tracing() {
    let pretty = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("pretty"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graphql_mount=debug,tower_http=debug".into()),
        )
        .with(pretty.then(tracing_subscriber::fmt::layer))
        .with((!pretty).then(|| tracing_subscriber::fmt::layer().json()))
        .init();
}

async fn create_user(
    users: &UsersRepository,
    username: String,
    email: Option<String>,
) -> anyhow::Result<()> {
    let user = users
        .create(CreateUser {
            username,
            email,
            profile: serde_json::json!({}),
        })
        .await?;
    let token = users.issue_login_token(&user.id).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "User created");
    println!("{token}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();
    tracing::info!(development = config.development, "Configuration loaded");

    let db = Database::connect(&config.database_url).await?;
    let users = db
        .users()
        .with_token_policy(TokenPolicy::from_days(config.login_expiration_days));
    tracing::info!("Database connected");

    let cli = CliOptions::from_args();
    if let Some(username) = cli.create_user {
        return create_user(&users, username, cli.email).await;
    }

    let schema = schema::build_schema(users.clone());
    let host = Router::new().route("/healthz", get(healthz));

    let mounted = GraphqlServer::new(schema.clone(), Arc::new(users))
        .development(config.development)
        .config(config.graphql.clone())
        .subscription_manager(schema)
        .mount(host)
        .await?;

    let app = mounted
        .router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let public_host = config.host.as_deref().unwrap_or("localhost");
    tracing::info!("Listening on {}", addr);
    tracing::info!(
        "GraphQL endpoint: http://{}:{}{}",
        public_host,
        config.port,
        mounted.config.path
    );
    if mounted.config.explorer_enabled {
        tracing::info!(
            "GraphQL explorer: http://{}:{}{}",
            public_host,
            config.port,
            mounted.config.explorer_path
        );
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    if let Some(subscriptions) = mounted.subscriptions {
        subscriptions.shutdown().await;
    }
    tracing::info!("Server stopped");

    Ok(())
}
