//! High-level client — `GraphqlClient`.
//!
//! The default chain sends subscriptions over the WebSocket link and every
//! other operation through the error link into the HTTP link:
//!
//! ```text
//! split(is_subscription)
//!   ├─ WebSocketLink  (reconnect)
//!   └─ ErrorLink(log_error_messages) → HttpLink
//! ```

use crate::cache::InMemoryCache;
use crate::document::OperationType;
use crate::error::{ClientError, LinkError};
use crate::http::HttpLink;
use crate::link::{
    is_subscription, log_error_messages, split, ErrorHandler, ErrorLink, ErrorResponse,
    FetchStream, Link,
};
use crate::network::EndpointConfig;
use crate::operation::{Operation, Response};
use crate::ws::{SubscriptionClient, WebSocketLink, WsConfig};

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// How `query` uses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Answer from the cache when complete, else fetch and store.
    #[default]
    CacheFirst,
    /// Always fetch, then store.
    NetworkOnly,
    /// Never fetch; a miss is [`ClientError::CacheMiss`].
    CacheOnly,
    /// Always fetch, never store.
    NoCache,
}

/// The primary entry point: link chain plus cache.
#[derive(Clone)]
pub struct GraphqlClient {
    pub(crate) link: Arc<dyn Link>,
    pub(crate) cache: InMemoryCache,
    pub(crate) default_fetch_policy: FetchPolicy,
    pub(crate) endpoints: Option<EndpointConfig>,
    pub(crate) subscriptions: Option<SubscriptionClient>,
}

impl GraphqlClient {
    pub fn builder() -> GraphqlClientBuilder {
        GraphqlClientBuilder::default()
    }

    /// The default client, with endpoints taken from `VUE_APP_GRAPHQL_PORT`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::builder().endpoints(EndpointConfig::from_env()).build()
    }

    /// Like [`from_env`](Self::from_env), loading `.env` first.
    pub fn from_dotenv() -> Result<Self, ClientError> {
        Self::builder().endpoints(EndpointConfig::from_dotenv()).build()
    }

    pub fn cache(&self) -> &InMemoryCache {
        &self.cache
    }

    /// Endpoints of the default chain; `None` when a custom link was given.
    pub fn endpoints(&self) -> Option<&EndpointConfig> {
        self.endpoints.as_ref()
    }

    /// The subscription transport of the default chain.
    pub fn subscription_client(&self) -> Option<&SubscriptionClient> {
        self.subscriptions.as_ref()
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Run a query with the default fetch policy.
    pub async fn query(&self, operation: Operation) -> Result<Response, ClientError> {
        self.query_with_policy(operation, self.default_fetch_policy)
            .await
    }

    pub async fn query_with_policy(
        &self,
        operation: Operation,
        policy: FetchPolicy,
    ) -> Result<Response, ClientError> {
        expect_operation(&operation, OperationType::Query)?;

        match policy {
            FetchPolicy::CacheFirst => {
                if let Some(data) = self.cache.read_query(&operation).await {
                    tracing::debug!(operation = operation.display_name(), "Cache hit");
                    return Ok(cached(data));
                }
                self.fetch(operation, true).await
            }
            FetchPolicy::CacheOnly => self
                .cache
                .read_query(&operation)
                .await
                .map(cached)
                .ok_or(ClientError::CacheMiss),
            FetchPolicy::NetworkOnly => self.fetch(operation, true).await,
            FetchPolicy::NoCache => self.fetch(operation, false).await,
        }
    }

    /// Run a mutation and store its result.
    pub async fn mutate(&self, operation: Operation) -> Result<Response, ClientError> {
        expect_operation(&operation, OperationType::Mutation)?;
        self.fetch(operation, true).await
    }

    /// Start a subscription. Each error-free event is written to the cache.
    pub async fn subscribe(&self, operation: Operation) -> Result<FetchStream, ClientError> {
        expect_operation(&operation, OperationType::Subscription)?;

        let cache = self.cache.clone();
        let stored = operation.clone();
        let stream = self
            .link
            .request(operation)
            .then(move |item| {
                let cache = cache.clone();
                let stored = stored.clone();
                async move {
                    if let Ok(resp) = &item {
                        store_result(&cache, &stored, resp).await;
                    }
                    item
                }
            })
            .boxed();
        Ok(stream)
    }

    /// Clear the cache.
    pub async fn reset_store(&self) {
        self.cache.reset().await;
    }

    async fn fetch(&self, operation: Operation, store: bool) -> Result<Response, ClientError> {
        let mut results = self.link.request(operation.clone());
        let resp = results.next().await.ok_or(ClientError::EmptyResult)??;
        if store {
            store_result(&self.cache, &operation, &resp).await;
        }
        Ok(resp)
    }
}

fn cached(data: serde_json::Value) -> Response {
    Response {
        data: Some(data),
        ..Default::default()
    }
}

async fn store_result(cache: &InMemoryCache, operation: &Operation, resp: &Response) {
    if !resp.is_ok() {
        return;
    }
    if let Some(data) = &resp.data {
        cache.write_query(operation, data).await;
    }
}

fn expect_operation(operation: &Operation, expected: OperationType) -> Result<(), ClientError> {
    let definition = operation.main_definition()?;
    if definition.operation == Some(expected) {
        Ok(())
    } else {
        Err(ClientError::OperationMismatch {
            expected,
            found: definition.describe(),
        })
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct GraphqlClientBuilder {
    endpoints: Option<EndpointConfig>,
    http_uri: Option<String>,
    ws_uri: Option<String>,
    reconnect: Option<bool>,
    http_timeout: Duration,
    ws_init_payload: Option<serde_json::Value>,
    on_error: Option<ErrorHandler>,
    cache: Option<InMemoryCache>,
    link: Option<Arc<dyn Link>>,
    default_fetch_policy: FetchPolicy,
}

impl Default for GraphqlClientBuilder {
    fn default() -> Self {
        Self {
            endpoints: None,
            http_uri: None,
            ws_uri: None,
            reconnect: None,
            http_timeout: Duration::from_secs(30),
            ws_init_payload: None,
            on_error: None,
            cache: None,
            link: None,
            default_fetch_policy: FetchPolicy::default(),
        }
    }
}

impl GraphqlClientBuilder {
    /// Base endpoints. Defaults to [`EndpointConfig::from_env`].
    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn http_uri(mut self, uri: &str) -> Self {
        self.http_uri = Some(uri.to_string());
        self
    }

    pub fn ws_uri(mut self, uri: &str) -> Self {
        self.ws_uri = Some(uri.to_string());
        self
    }

    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = Some(reconnect);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Payload sent with `connection_init`.
    pub fn ws_init_payload(mut self, payload: serde_json::Value) -> Self {
        self.ws_init_payload = Some(payload);
        self
    }

    /// Replace the default [`log_error_messages`] handler.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ErrorResponse<'_>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn cache(mut self, cache: InMemoryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use `link` instead of the default chain.
    pub fn link(mut self, link: impl Link + 'static) -> Self {
        self.link = Some(Arc::new(link));
        self
    }

    pub fn default_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.default_fetch_policy = policy;
        self
    }

    pub fn build(self) -> Result<GraphqlClient, ClientError> {
        let cache = self.cache.unwrap_or_default();

        if let Some(link) = self.link {
            return Ok(GraphqlClient {
                link,
                cache,
                default_fetch_policy: self.default_fetch_policy,
                endpoints: None,
                subscriptions: None,
            });
        }

        let mut endpoints = self.endpoints.unwrap_or_else(EndpointConfig::from_env);
        if let Some(uri) = self.http_uri {
            endpoints.http_uri = uri;
        }
        if let Some(uri) = self.ws_uri {
            endpoints.ws_uri = uri;
        }
        if let Some(reconnect) = self.reconnect {
            endpoints.reconnect = reconnect;
        }

        let http = HttpLink::builder(&endpoints.http_uri)
            .timeout(self.http_timeout)
            .build()
            .map_err(LinkError::from)?;

        let ws_config = WsConfig {
            reconnect: endpoints.reconnect,
            init_payload: self.ws_init_payload,
            ..WsConfig::new(endpoints.ws_uri.clone())
        };
        let ws = WebSocketLink::new(ws_config);
        let subscriptions = ws.client().clone();

        let handler: ErrorHandler = match self.on_error {
            Some(handler) => handler,
            None => Arc::new(log_error_messages),
        };

        let link = split(is_subscription, ws, ErrorLink::new(handler, http));

        tracing::info!(
            http = %endpoints.http_uri,
            ws = %endpoints.ws_uri,
            reconnect = endpoints.reconnect,
            "GraphQL client configured"
        );

        Ok(GraphqlClient {
            link: Arc::new(link),
            cache,
            default_fetch_policy: self.default_fetch_policy,
            endpoints: Some(endpoints),
            subscriptions: Some(subscriptions),
        })
    }
}
