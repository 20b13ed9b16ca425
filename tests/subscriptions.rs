//! End-to-end tests of the subscription listener over a real WebSocket.

use std::sync::Arc;
use std::time::Duration;

use async_graphql::{Context, EmptyMutation, Object, Schema, Subscription};
use axum::Router;
use futures::{SinkExt, Stream, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use graphql_mount::db::{CreateUser, Database, UsersRepository};
use graphql_mount::graphql::AuthExt;
use graphql_mount::{ConfigOverrides, GraphqlServer, MountedServer};

struct Query;

#[Object]
impl Query {
    async fn ping(&self) -> &str {
        "pong"
    }
}

struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Emits the connection's username once
    async fn whoami<'ctx>(
        &self,
        ctx: &Context<'ctx>,
    ) -> impl Stream<Item = Option<String>> + 'ctx {
        let username = ctx
            .try_auth_user()
            .map(|identity| identity.user.username.clone());
        futures::stream::once(async move { username })
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Mounts a schema with the listener on an ephemeral port; returns the server,
/// the listener port and a valid login token for `alice`.
async fn start() -> (MountedServer, u16, String) {
    let users: UsersRepository = Database::connect_in_memory().await.unwrap().users();
    let user = users
        .create(CreateUser {
            username: "alice".into(),
            email: None,
            profile: json!({}),
        })
        .await
        .unwrap();
    let token = users.issue_login_token(&user.id).await.unwrap();

    let schema = Schema::new(Query, EmptyMutation, SubscriptionRoot);
    let mounted = GraphqlServer::new(schema.clone(), Arc::new(users))
        .config(ConfigOverrides {
            subscription_port: Some(0),
            ..Default::default()
        })
        .subscription_manager(schema)
        .mount(Router::new())
        .await
        .unwrap();
    let port = mounted
        .subscriptions
        .as_ref()
        .expect("listener started")
        .local_addr()
        .port();

    (mounted, port, token)
}

async fn connect(port: u16, authorization: Option<&str>) -> Socket {
    let mut request = format!("ws://127.0.0.1:{port}/")
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static("graphql-transport-ws"),
    );
    if let Some(token) = authorization {
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(token).unwrap());
    }
    let (socket, _) = connect_async(request).await.unwrap();
    socket
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket.send(Message::text(value.to_string())).await.unwrap();
}

async fn next_message(socket: &mut Socket) -> Message {
    tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("no message within 5s")
        .expect("socket closed")
        .unwrap()
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        if let Message::Text(text) = next_message(socket).await {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Runs `subscription { whoami }` on a fresh connection and returns the first value.
async fn whoami(port: u16, header: Option<&str>, payload: Value) -> Value {
    let mut socket = connect(port, header).await;
    send_json(
        &mut socket,
        json!({ "type": "connection_init", "payload": payload }),
    )
    .await;
    assert_eq!(next_json(&mut socket).await["type"], "connection_ack");

    send_json(
        &mut socket,
        json!({
            "id": "1",
            "type": "subscribe",
            "payload": { "query": "subscription { whoami }" }
        }),
    )
    .await;
    let message = next_json(&mut socket).await;
    assert_eq!(message["type"], "next", "{message}");
    assert_eq!(message["id"], "1");
    message["payload"]["data"]["whoami"].clone()
}

#[tokio::test]
async fn anonymous_subscription_has_no_user() {
    let (mounted, port, _) = start().await;

    assert_eq!(whoami(port, None, json!({})).await, Value::Null);

    if let Some(listener) = mounted.subscriptions {
        listener.shutdown().await;
    }
}

#[tokio::test]
async fn upgrade_header_authenticates_subscription() {
    let (_mounted, port, token) = start().await;

    assert_eq!(whoami(port, Some(&token), json!({})).await, json!("alice"));
}

#[tokio::test]
async fn connection_init_payload_authenticates_subscription() {
    let (_mounted, port, token) = start().await;

    assert_eq!(
        whoami(port, None, json!({ "Authorization": token })).await,
        json!("alice")
    );
}

#[tokio::test]
async fn unknown_payload_token_overrides_header() {
    let (_mounted, port, token) = start().await;

    assert_eq!(
        whoami(port, Some(&token), json!({ "Authorization": "abc123" })).await,
        Value::Null
    );
}

#[tokio::test]
async fn non_string_payload_token_closes_connection() {
    let (_mounted, port, _) = start().await;
    let mut socket = connect(port, None).await;

    send_json(
        &mut socket,
        json!({ "type": "connection_init", "payload": { "Authorization": 12 } }),
    )
    .await;

    match next_message(&mut socket).await {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1002),
        other => panic!("expected close, got {other:?}"),
    }
}
