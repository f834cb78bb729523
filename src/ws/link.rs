//! `WebSocketLink` — terminating link for subscriptions.

use futures_util::StreamExt;

use crate::error::LinkError;
use crate::link::{FetchStream, Link};
use crate::operation::Operation;
use crate::ws::native::SubscriptionClient;
use crate::ws::WsConfig;

/// Sends operations over the shared subscription connection.
#[derive(Clone)]
pub struct WebSocketLink {
    client: SubscriptionClient,
}

impl WebSocketLink {
    pub fn new(config: WsConfig) -> Self {
        Self {
            client: SubscriptionClient::new(config),
        }
    }

    pub fn from_client(client: SubscriptionClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SubscriptionClient {
        &self.client
    }
}

impl Link for WebSocketLink {
    fn request(&self, operation: Operation) -> FetchStream {
        let client = self.client.clone();
        Box::pin(async_stream::stream! {
            match client.start(operation).await {
                Ok(mut results) => {
                    while let Some(item) = results.next().await {
                        yield item;
                    }
                }
                Err(e) => yield Err(LinkError::Ws(e)),
            }
        })
    }
}
