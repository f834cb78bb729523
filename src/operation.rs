//! Operation and response types shared by every link.

use crate::document::{main_definition, MainDefinition};
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};

/// An outgoing GraphQL operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub query: String,
    #[serde(default)]
    pub variables: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl Operation {
    /// Create an operation with empty variables.
    ///
    /// The operation name is taken from the document when it names one.
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let operation_name = main_definition(&query)
            .ok()
            .filter(|def| def.operation.is_some())
            .and_then(|def| def.name);
        Self {
            query,
            variables: serde_json::Value::Object(serde_json::Map::new()),
            operation_name,
            extensions: None,
        }
    }

    pub fn with_variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_extensions(mut self, extensions: serde_json::Value) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Parse the document and return its main definition.
    pub fn main_definition(&self) -> Result<MainDefinition, DocumentError> {
        main_definition(&self.query)
    }

    /// Whether the main definition is a subscription.
    ///
    /// Unparseable documents are not subscriptions.
    pub fn is_subscription(&self) -> bool {
        self.main_definition()
            .map(|def| def.is_subscription())
            .unwrap_or(false)
    }

    /// Name used in logs: the operation name, or `"anonymous"`.
    pub fn display_name(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("anonymous")
    }
}

/// A GraphQL execution result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl Response {
    /// Returns `true` if no GraphQL errors were returned.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Error location within a document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// Response path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// A GraphQL error as returned in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphqlErrorLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }
}
