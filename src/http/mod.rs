//! HTTP link — GraphQL over HTTP POST.

pub mod client;

pub use client::{HttpLink, HttpLinkBuilder};
