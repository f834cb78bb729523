//! Predicate routing between two links.

use super::{FetchStream, Link};
use crate::operation::Operation;

/// Routes each operation to `left` when the predicate holds, else `right`.
pub struct Split<P, L, R> {
    predicate: P,
    left: L,
    right: R,
}

impl<P, L, R> Split<P, L, R>
where
    P: Fn(&Operation) -> bool + Send + Sync,
    L: Link,
    R: Link,
{
    pub fn new(predicate: P, left: L, right: R) -> Self {
        Self {
            predicate,
            left,
            right,
        }
    }
}

impl<P, L, R> Link for Split<P, L, R>
where
    P: Fn(&Operation) -> bool + Send + Sync,
    L: Link,
    R: Link,
{
    fn request(&self, operation: Operation) -> FetchStream {
        if (self.predicate)(&operation) {
            tracing::debug!(operation = operation.display_name(), "Routing left");
            self.left.request(operation)
        } else {
            tracing::debug!(operation = operation.display_name(), "Routing right");
            self.right.request(operation)
        }
    }
}

/// Shorthand for [`Split::new`].
pub fn split<P, L, R>(predicate: P, left: L, right: R) -> Split<P, L, R>
where
    P: Fn(&Operation) -> bool + Send + Sync,
    L: Link,
    R: Link,
{
    Split::new(predicate, left, right)
}

/// True when the main definition is an `OperationDefinition` of type
/// `subscription`.
pub fn is_subscription(operation: &Operation) -> bool {
    operation.is_subscription()
}
