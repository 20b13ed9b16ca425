//! Error taxonomy for the adapter.
//!
//! Anonymous fallback (missing, unknown or expired tokens) is not an error and
//! never shows up here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid setup detected at startup. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A request carried malformed input, e.g. an `Authorization` header
    /// that is not a string.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A mutation or subscription was sent with a method that only allows queries.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The user store failed while looking up a login token.
    #[error("user store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// The caller's per-request options provider failed.
    #[error("options provider error: {0:#}")]
    Options(#[source] anyhow::Error),

    /// The auxiliary subscription listener could not be started.
    #[error("subscription listener failed to start: {0}")]
    Startup(#[from] std::io::Error),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::Store(_) => "store_error",
            Self::Options(_) => "options_error",
            Self::Startup(_) => "startup_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "GraphQL request failed");
        }
        let body = serde_json::json!({
            "error": self.error_kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let response = Error::InvalidInput("header".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn method_not_allowed_maps_to_405() {
        let response = Error::MethodNotAllowed("mutation over GET".into()).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn store_failure_maps_to_server_error() {
        let response = Error::Store(anyhow::anyhow!("connection reset")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
