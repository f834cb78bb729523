//! Unified client error types.

use crate::document::OperationType;
use crate::operation::GraphqlError;
use thiserror::Error;

/// Top-level client error.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Expected a {expected} operation, got {found}")]
    OperationMismatch {
        expected: OperationType,
        found: String,
    },

    #[error("Cache miss for cache-only query")]
    CacheMiss,

    #[error("Link completed without a result")]
    EmptyResult,
}

/// The single link-level error category.
///
/// Covers network failures, server errors and GraphQL error payloads
/// delivered as errors by a transport.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("GraphQL errors: {}", join_messages(.errors))]
    Graphql { errors: Vec<GraphqlError> },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Response not successful: Received status code {status}")]
    Status {
        status: u16,
        body: String,
        result: Option<serde_json::Value>,
    },

    #[error("Failed to parse response (status {status}): {message}")]
    Parse {
        status: u16,
        body: String,
        message: String,
    },

    #[error("Server response was missing data and errors (status {status})")]
    MissingData { status: u16 },
}

impl HttpError {
    /// HTTP status code carried by the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            #[cfg(feature = "http")]
            HttpError::Request(e) => e.status().map(|s| s.as_u16()),
            HttpError::Status { status, .. }
            | HttpError::Parse { status, .. }
            | HttpError::MissingData { status } => Some(*status),
        }
    }
}

/// WebSocket errors.
#[derive(Error, Debug, Clone)]
pub enum WsError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection rejected by server: {0}")]
    ConnectionRejected(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("Gave up reconnecting after {attempts} attempts")]
    MaxReconnectReached { attempts: u32 },
}

/// GraphQL document errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Invalid GraphQL document: {0}")]
    Parse(String),

    #[error(
        "Expected a parsed GraphQL query with a query, mutation, subscription, or a fragment"
    )]
    NoDefinition,
}

fn join_messages(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_display_joins_messages() {
        let err = LinkError::Graphql {
            errors: vec![GraphqlError::new("first"), GraphqlError::new("second")],
        };
        assert_eq!(err.to_string(), "GraphQL errors: first; second");
    }

    #[test]
    fn test_http_status_error_display_and_status() {
        let err = HttpError::Status {
            status: 500,
            body: "boom".into(),
            result: None,
        };
        assert_eq!(
            err.to_string(),
            "Response not successful: Received status code 500"
        );
        assert_eq!(err.status(), Some(500));
    }
}
