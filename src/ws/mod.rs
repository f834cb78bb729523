//! WebSocket layer — `graphql-ws` protocol messages and connection config.
//!
//! The transport (`native.rs`) and the link built on it (`link.rs`) are
//! behind the `ws-native` feature. This module defines the shared wire
//! types of the subscriptions protocol:
//!
//! | client → server        | server → client                      |
//! |------------------------|--------------------------------------|
//! | `connection_init`      | `connection_ack`, `connection_error` |
//! | `start {id, payload}`  | `data {id, payload}`                 |
//! | `stop {id}`            | `error {id, payload}`, `complete`    |
//! | `connection_terminate` | `ka`                                 |

#[cfg(feature = "ws-native")]
pub mod link;

#[cfg(feature = "ws-native")]
pub mod native;

use crate::operation::{GraphqlError, Operation, Response};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ws-native")]
pub use link::WebSocketLink;
#[cfg(feature = "ws-native")]
pub use native::{SubscriptionClient, SubscriptionStream};

/// WebSocket subprotocol negotiated with the server.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageOut {
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Start {
        id: String,
        payload: Operation,
    },
    Stop {
        id: String,
    },
    ConnectionTerminate,
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// Messages received from the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageIn {
    ConnectionAck {
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
    ConnectionError {
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
    #[serde(rename = "ka")]
    KeepAlive {},
    Data {
        id: String,
        payload: Response,
    },
    Error {
        id: String,
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
    Complete {
        id: String,
    },
}

/// Decode the payload of an `error` message: one error object or a list.
pub fn decode_error_payload(payload: Option<serde_json::Value>) -> Vec<GraphqlError> {
    let errors = payload.and_then(|value| {
        if value.is_array() {
            serde_json::from_value::<Vec<GraphqlError>>(value).ok()
        } else {
            serde_json::from_value::<GraphqlError>(value)
                .ok()
                .map(|e| vec![e])
        }
    });
    match errors {
        Some(errors) if !errors.is_empty() => errors,
        _ => vec![GraphqlError::new("Subscription failed")],
    }
}

// ─── Connection state ────────────────────────────────────────────────────────

/// WebSocket connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u8> for ReadyState {
    fn from(v: u8) -> Self {
        match v {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Configuration for the subscription transport.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    /// Reconnect after the connection drops while operations are active.
    pub reconnect: bool,
    pub base_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Applies to the TCP/WS handshake and to `connection_ack`.
    pub connection_timeout_ms: u64,
    /// Once the server has sent `ka`, silence longer than this drops the
    /// connection.
    pub keep_alive_timeout_ms: u64,
    /// Payload of `connection_init`.
    pub init_payload: Option<serde_json::Value>,
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: true,
            base_reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30_000,
            max_reconnect_attempts: None,
            connection_timeout_ms: 10_000,
            keep_alive_timeout_ms: 30_000,
            init_payload: None,
        }
    }
}
