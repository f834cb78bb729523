//! Terminating HTTP link — `HttpLink`.
//!
//! Sends every operation as a JSON POST to one endpoint and maps the answer
//! into a [`Response`] or an [`HttpError`]. No retries: failures surface to
//! whatever wraps this link.

use crate::error::{HttpError, LinkError};
use crate::link::{single, FetchStream, Link};
use crate::operation::{Operation, Response};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

const MAX_BODY_LEN: usize = 4096;

/// HTTP transport for queries and mutations.
#[derive(Clone)]
pub struct HttpLink {
    uri: String,
    client: Client,
}

impl HttpLink {
    /// Link with the default timeout and headers.
    pub fn new(uri: &str) -> Result<Self, HttpError> {
        HttpLinkBuilder::new(uri).build()
    }

    pub fn builder(uri: &str) -> HttpLinkBuilder {
        HttpLinkBuilder::new(uri)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// POST one operation and parse the result.
    pub async fn fetch(&self, operation: &Operation) -> Result<Response, HttpError> {
        tracing::debug!(
            uri = %self.uri,
            operation = operation.display_name(),
            "Sending GraphQL request"
        );

        let resp = self
            .client
            .post(&self.uri)
            .header(ACCEPT, "application/json")
            .json(operation)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;

        parse_response(status, &body)
    }
}

impl Link for HttpLink {
    fn request(&self, operation: Operation) -> FetchStream {
        let link = self.clone();
        single(async move { link.fetch(&operation).await.map_err(LinkError::from) })
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct HttpLinkBuilder {
    uri: String,
    timeout: Duration,
    headers: HeaderMap,
}

impl HttpLinkBuilder {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            timeout: Duration::from_secs(30),
            headers: HeaderMap::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add an `Authorization: Bearer` header.
    pub fn bearer_token(self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => self.header(reqwest::header::AUTHORIZATION, value),
            Err(_) => {
                tracing::warn!("Ignoring bearer token with invalid header characters");
                self
            }
        }
    }

    pub fn build(self) -> Result<HttpLink, HttpError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(10)
            .default_headers(self.headers)
            .build()?;

        Ok(HttpLink {
            uri: self.uri,
            client,
        })
    }
}

// ─── Response mapping ────────────────────────────────────────────────────────

/// Map a raw HTTP answer to a GraphQL result.
///
/// Non-2xx is always an error, carrying the parsed body when it was JSON.
/// A 2xx body must be a JSON object with `data` or `errors`.
fn parse_response(status: u16, body: &str) -> Result<Response, HttpError> {
    let parsed = serde_json::from_str::<serde_json::Value>(body);

    if status >= 300 {
        return Err(HttpError::Status {
            status,
            body: truncate_body(body),
            result: parsed.ok(),
        });
    }

    let value = parsed.map_err(|e| HttpError::Parse {
        status,
        body: truncate_body(body),
        message: e.to_string(),
    })?;

    if value.get("data").is_none() && value.get("errors").is_none() {
        return Err(HttpError::MissingData { status });
    }

    serde_json::from_value(value).map_err(|e| HttpError::Parse {
        status,
        body: truncate_body(body),
        message: e.to_string(),
    })
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let resp = parse_response(200, r#"{"data":{"projects":[]}}"#).unwrap();
        assert_eq!(resp.data, Some(json!({"projects": []})));
        assert!(resp.is_ok());
    }

    #[test]
    fn test_parse_graphql_errors_on_200_is_ok() {
        let resp = parse_response(200, r#"{"data":null,"errors":[{"message":"bad"}]}"#).unwrap();
        assert_eq!(resp.data, None);
        assert_eq!(resp.errors[0].message, "bad");
    }

    #[test]
    fn test_parse_status_error_keeps_json_result() {
        let err = parse_response(400, r#"{"errors":[{"message":"syntax"}]}"#).unwrap_err();
        match err {
            HttpError::Status { status, result, .. } => {
                assert_eq!(status, 400);
                assert_eq!(result.unwrap()["errors"][0]["message"], "syntax");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_status_error_with_html() {
        let err = parse_response(502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(
            err,
            HttpError::Status { status: 502, result: None, .. }
        ));
    }

    #[test]
    fn test_parse_invalid_json_on_200() {
        let err = parse_response(200, "not json").unwrap_err();
        assert!(matches!(err, HttpError::Parse { status: 200, .. }));
    }

    #[test]
    fn test_parse_missing_data_and_errors() {
        let err = parse_response(200, r#"{"foo":1}"#).unwrap_err();
        assert!(matches!(err, HttpError::MissingData { status: 200 }));
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(MAX_BODY_LEN);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with('…'));
        assert!(truncated.len() <= MAX_BODY_LEN + '…'.len_utf8());
    }

    #[test]
    fn test_link_builds_without_network() {
        let link = HttpLink::new("http://localhost:undefined/graphql").unwrap();
        assert_eq!(link.uri(), "http://localhost:undefined/graphql");
    }
}
