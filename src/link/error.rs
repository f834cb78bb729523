//! Error-logging link: observes errors, never changes them.

use super::{FetchStream, Link};
use crate::error::LinkError;
use crate::operation::{GraphqlError, Operation, Response};
use futures_util::StreamExt;
use std::sync::Arc;

/// What the error handler sees for one failed result.
#[derive(Debug)]
pub struct ErrorResponse<'a> {
    pub operation: &'a Operation,
    /// Set for transport, server and protocol failures.
    pub network_error: Option<&'a LinkError>,
    /// Set for results carrying GraphQL errors.
    pub graphql_errors: &'a [GraphqlError],
    /// The result itself when it arrived as `Ok` with errors.
    pub response: Option<&'a Response>,
}

/// Callback invoked once per failed result.
pub type ErrorHandler = Arc<dyn Fn(&ErrorResponse<'_>) + Send + Sync>;

/// Link that reports every error of the forward link to a handler.
pub struct ErrorLink<L> {
    handler: ErrorHandler,
    forward: L,
}

impl<L: Link> ErrorLink<L> {
    pub fn new(handler: ErrorHandler, forward: L) -> Self {
        Self { handler, forward }
    }
}

/// Wrap `forward` so that `handler` sees every error it produces.
pub fn on_error<F, L>(handler: F, forward: L) -> ErrorLink<L>
where
    F: Fn(&ErrorResponse<'_>) + Send + Sync + 'static,
    L: Link,
{
    ErrorLink::new(Arc::new(handler), forward)
}

impl<L: Link> Link for ErrorLink<L> {
    fn request(&self, operation: Operation) -> FetchStream {
        let handler = Arc::clone(&self.handler);
        let observed = operation.clone();

        self.forward
            .request(operation)
            .inspect(move |item| match item {
                Err(LinkError::Graphql { errors }) => handler(&ErrorResponse {
                    operation: &observed,
                    network_error: None,
                    graphql_errors: errors,
                    response: None,
                }),
                Err(e) => handler(&ErrorResponse {
                    operation: &observed,
                    network_error: Some(e),
                    graphql_errors: &[],
                    response: None,
                }),
                Ok(resp) if !resp.errors.is_empty() => handler(&ErrorResponse {
                    operation: &observed,
                    network_error: None,
                    graphql_errors: &resp.errors,
                    response: Some(resp),
                }),
                Ok(_) => {}
            })
            .boxed()
    }
}

/// Default handler: one `error` event per GraphQL error and per network error.
pub fn log_error_messages(response: &ErrorResponse<'_>) {
    let operation = response.operation.display_name();

    for error in response.graphql_errors {
        let locations = error
            .locations
            .iter()
            .map(|l| format!("{}:{}", l.line, l.column))
            .collect::<Vec<_>>()
            .join(", ");
        let path = error
            .path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        tracing::error!(
            operation,
            locations = %locations,
            path = %path,
            "[GraphQL error]: {}",
            error.message
        );
    }

    if let Some(e) = response.network_error {
        tracing::error!(operation, status = ?http_status(e), "[Network error]: {}", e);
    }
}

fn http_status(error: &LinkError) -> Option<u16> {
    match error {
        LinkError::Http(e) => e.status(),
        _ => None,
    }
}
