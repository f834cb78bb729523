//! Endpoint configuration for the GraphQL API.

/// Environment variable holding the API port.
pub const PORT_ENV_VAR: &str = "VUE_APP_GRAPHQL_PORT";

/// Rendering of a port that was never configured.
pub const UNSET_PORT: &str = "undefined";

/// HTTP endpoint for `port`.
pub fn http_endpoint(port: &str) -> String {
    format!("http://localhost:{}/graphql", port)
}

/// WebSocket endpoint for `port`.
pub fn ws_endpoint(port: &str) -> String {
    format!("ws://localhost:{}/subscriptions", port)
}

/// Endpoint URLs plus the subscription reconnect flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub http_uri: String,
    pub ws_uri: String,
    pub reconnect: bool,
}

impl EndpointConfig {
    /// Build both endpoints from a port, used verbatim.
    ///
    /// A missing port is not an error: it renders as `undefined`.
    pub fn from_port(port: Option<&str>) -> Self {
        let port = match port {
            Some(p) => p,
            None => {
                tracing::warn!(
                    var = PORT_ENV_VAR,
                    "GraphQL port is not set, endpoints will point at localhost:{}",
                    UNSET_PORT
                );
                UNSET_PORT
            }
        };
        Self {
            http_uri: http_endpoint(port),
            ws_uri: ws_endpoint(port),
            reconnect: true,
        }
    }

    /// Read the port from the process environment.
    pub fn from_env() -> Self {
        let port = std::env::var(PORT_ENV_VAR).ok();
        Self::from_port(port.as_deref())
    }

    /// Load `.env` (if present) and then read the port from the environment.
    pub fn from_dotenv() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env loaded: {}", e);
        }
        Self::from_env()
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
