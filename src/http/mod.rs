//! HTTP mount: registers the GraphQL endpoint and the optional explorer on a host router.
//!
//! The endpoint accepts GraphQL-over-HTTP requests (JSON POST bodies, or GET with
//! query parameters). For every request the options are built by the
//! [RequestContextBuilder] before the request reaches the executor.

mod explorer;

use async_graphql::Executor;
use async_graphql::parser::parse_query;
use async_graphql::parser::types::{DocumentOperations, OperationType};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Router;
use axum::extract::{FromRequest, Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Error;
use crate::graphql::RequestContextBuilder;

pub use explorer::ExplorerPage;

/// State shared by the GraphQL endpoint handlers.
struct GraphqlState<E> {
    executor: E,
    builder: RequestContextBuilder,
}

impl<E: Clone> Clone for GraphqlState<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            builder: self.builder.clone(),
        }
    }
}

/// Build the GraphQL router and merge it into `host`.
///
/// `config.configure_server` gets the host router first; the endpoint and the
/// explorer are registered on whatever it returns.
pub fn mount<E: Executor>(
    host: Router,
    config: &ServerConfig,
    executor: E,
    builder: RequestContextBuilder,
) -> Router {
    let host = config.configure_server.apply(host);

    let mut server = Router::new()
        .route(
            &config.path,
            get(graphql_handler::<E>).post(graphql_handler::<E>),
        )
        .with_state(GraphqlState { executor, builder });
    info!(service = "graphql", path = %config.path, "GraphQL endpoint mounted");

    if config.explorer_enabled {
        let page = ExplorerPage::new(config);
        server = server.route(&config.explorer_path, get(explorer::handler).with_state(page));
        info!(
            service = "graphql",
            path = %config.explorer_path,
            endpoint = %config.path,
            "GraphQL explorer mounted"
        );
    }

    host.merge(server)
}

async fn graphql_handler<E: Executor>(
    State(state): State<GraphqlState<E>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let is_get = parts.method == Method::GET;
    let options = match state.builder.build(&parts).await {
        Ok(options) => options,
        Err(e) => return e.into_response(),
    };

    let request = Request::from_parts(parts, body);
    let graphql = match <GraphQLRequest as FromRequest<()>>::from_request(request, &()).await {
        Ok(graphql) => graphql.into_inner(),
        Err(rejection) => return rejection.into_response(),
    };
    if is_get && !is_query_operation(&graphql) {
        return Error::MethodNotAllowed("only queries may be sent with GET".to_string())
            .into_response();
    }

    let response = state.executor.execute(options.apply(graphql)).await;
    GraphQLResponse::from(options.finish(response)).into_response()
}

/// Whether the operation `request` selects is a query. Documents that fail to
/// parse, or name no existing operation, count as queries; execution reports those.
fn is_query_operation(request: &async_graphql::Request) -> bool {
    let Ok(document) = parse_query(&request.query) else {
        return true;
    };
    let operation = match (&document.operations, request.operation_name.as_deref()) {
        (DocumentOperations::Single(operation), _) => Some(operation),
        (DocumentOperations::Multiple(operations), Some(name)) => operations.get(name),
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => {
            operations.values().next()
        }
        (DocumentOperations::Multiple(_), None) => None,
    };
    operation.is_none_or(|operation| operation.node.ty == OperationType::Query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str, operation_name: Option<&str>) -> async_graphql::Request {
        let request = async_graphql::Request::new(query);
        match operation_name {
            Some(name) => request.operation_name(name),
            None => request,
        }
    }

    #[test]
    fn test_is_query_operation() {
        assert!(is_query_operation(&request("{ me }", None)));
        assert!(is_query_operation(&request("query Me { me }", None)));
        assert!(!is_query_operation(&request("mutation { bump }", None)));
        assert!(!is_query_operation(&request("subscription { clock }", None)));
        assert!(is_query_operation(&request("not graphql", None)));

        let document = "query Me { me } mutation Bump { bump }";
        assert!(is_query_operation(&request(document, Some("Me"))));
        assert!(!is_query_operation(&request(document, Some("Bump"))));
        assert!(is_query_operation(&request(document, None)));
    }
}
