//! # guijs GraphQL client
//!
//! The GraphQL client used by the guijs frontend: queries and mutations over
//! HTTP, subscriptions over WebSocket, one error hook and a normalized cache.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core** — Operations, responses, document inspection, endpoints, errors
//! 2. **Links** — The `Link` trait, `split` routing and the error hook
//! 3. **HTTP** — `HttpLink` over `reqwest`
//! 4. **WebSocket** — `graphql-ws` protocol over `tokio-tungstenite`, with reconnect
//! 5. **Cache** — `InMemoryCache`, normalized by `__typename` and id
//! 6. **High-Level Client** — `GraphqlClient` wiring all of the above
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use guijs_graphql::prelude::*;
//!
//! // Endpoints from VUE_APP_GRAPHQL_PORT
//! let client = GraphqlClient::from_env()?;
//!
//! let projects = client
//!     .query(Operation::new("query Projects { projects { id name } }"))
//!     .await?;
//!
//! let mut events = client
//!     .subscribe(Operation::new("subscription { taskChanged { id status } }"))
//!     .await?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event?.data);
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Operations, responses and GraphQL errors.
pub mod operation;

/// Main-definition lookup for GraphQL documents.
pub mod document;

/// Unified client error types.
pub mod error;

/// Endpoint configuration.
pub mod network;

// ── Layer 2: Links ───────────────────────────────────────────────────────────

/// The request pipeline: `Link`, `split`, `ErrorLink`.
pub mod link;

// ── Layer 3: HTTP ────────────────────────────────────────────────────────────

/// HTTP terminating link.
#[cfg(feature = "http")]
pub mod http;

// ── Layer 4: WebSocket ───────────────────────────────────────────────────────

/// WebSocket subscriptions: protocol messages, transport, link.
pub mod ws;

// ── Layer 5: Cache ───────────────────────────────────────────────────────────

/// Normalized in-memory cache.
pub mod cache;

// ── Layer 6: High-Level Client ───────────────────────────────────────────────

/// `GraphqlClient` — the primary entry point.
#[cfg(all(feature = "http", feature = "ws-native"))]
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Operations
    pub use crate::document::{main_definition, DefinitionKind, MainDefinition, OperationType};
    pub use crate::operation::{GraphqlError, Operation, Response};

    // Errors
    pub use crate::error::{ClientError, DocumentError, HttpError, LinkError, WsError};

    // Network
    pub use crate::network::{EndpointConfig, PORT_ENV_VAR};

    // Links
    pub use crate::link::{
        is_subscription, log_error_messages, on_error, split, ErrorLink, ErrorResponse,
        FetchStream, Link, Split,
    };

    // Cache
    pub use crate::cache::{CacheConfig, InMemoryCache};

    // Transports
    #[cfg(feature = "http")]
    pub use crate::http::{HttpLink, HttpLinkBuilder};
    #[cfg(feature = "ws-native")]
    pub use crate::ws::{SubscriptionClient, WebSocketLink};
    pub use crate::ws::{ReadyState, WsConfig};

    // High-level client
    #[cfg(all(feature = "http", feature = "ws-native"))]
    pub use crate::client::{FetchPolicy, GraphqlClient, GraphqlClientBuilder};

    pub use futures_util::StreamExt;
}
