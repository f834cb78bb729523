//! Link layer — the composable request pipeline.
//!
//! A link takes an [`Operation`] and returns a stream of results. Queries and
//! mutations produce a single item, subscriptions produce one item per event.
//! Links compose: [`ErrorLink`] wraps another link, [`Split`] routes between
//! two links.

pub mod error;
pub mod split;

pub use error::{log_error_messages, on_error, ErrorHandler, ErrorLink, ErrorResponse};
pub use split::{is_subscription, split, Split};

use crate::error::LinkError;
use crate::operation::{Operation, Response};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;

/// Stream of results produced by a link.
pub type FetchStream = BoxStream<'static, Result<Response, LinkError>>;

/// A transport or middleware in the request pipeline.
pub trait Link: Send + Sync {
    fn request(&self, operation: Operation) -> FetchStream;
}

impl<L: Link + ?Sized> Link for Arc<L> {
    fn request(&self, operation: Operation) -> FetchStream {
        (**self).request(operation)
    }
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn request(&self, operation: Operation) -> FetchStream {
        (**self).request(operation)
    }
}

/// Wrap a single-result future as a [`FetchStream`].
pub fn single<F>(fut: F) -> FetchStream
where
    F: Future<Output = Result<Response, LinkError>> + Send + 'static,
{
    futures_util::stream::once(fut).boxed()
}
