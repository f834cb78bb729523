//! GraphQL document inspection — finds the definition that decides routing.

use crate::error::DocumentError;
use graphql_parser::query::{parse_query, Definition, OperationDefinition};
use std::fmt;

/// Kind of a top-level definition in an executable document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    OperationDefinition,
    FragmentDefinition,
}

/// GraphQL operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main definition of a document.
///
/// `operation` is `None` for fragment definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainDefinition {
    pub kind: DefinitionKind,
    pub operation: Option<OperationType>,
    pub name: Option<String>,
}

impl MainDefinition {
    /// Whether this definition is a subscription operation.
    pub fn is_subscription(&self) -> bool {
        self.kind == DefinitionKind::OperationDefinition
            && self.operation == Some(OperationType::Subscription)
    }

    /// Operation type name, or `"fragment"` for fragment definitions.
    pub fn describe(&self) -> String {
        match self.operation {
            Some(op) => op.as_str().to_string(),
            None => "fragment".to_string(),
        }
    }
}

/// Parse `query` and return its main definition.
///
/// The first operation definition wins; anonymous `{ ... }` shorthand counts
/// as a query. Documents holding only fragments yield the first fragment.
pub fn main_definition(query: &str) -> Result<MainDefinition, DocumentError> {
    let document =
        parse_query::<&str>(query).map_err(|e| DocumentError::Parse(e.to_string()))?;

    let mut first_fragment = None;

    for definition in &document.definitions {
        match definition {
            Definition::Operation(op) => {
                let (operation, name) = match op {
                    OperationDefinition::SelectionSet(_) => (OperationType::Query, None),
                    OperationDefinition::Query(q) => (OperationType::Query, q.name),
                    OperationDefinition::Mutation(m) => (OperationType::Mutation, m.name),
                    OperationDefinition::Subscription(s) => {
                        (OperationType::Subscription, s.name)
                    }
                };
                return Ok(MainDefinition {
                    kind: DefinitionKind::OperationDefinition,
                    operation: Some(operation),
                    name: name.map(str::to_string),
                });
            }
            Definition::Fragment(fragment) => {
                if first_fragment.is_none() {
                    first_fragment = Some(MainDefinition {
                        kind: DefinitionKind::FragmentDefinition,
                        operation: None,
                        name: Some(fragment.name.to_string()),
                    });
                }
            }
        }
    }

    first_fragment.ok_or(DocumentError::NoDefinition)
}
