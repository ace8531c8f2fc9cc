//! Error types for document loading and identifier resolution

use crate::search::Suggestion;
use thiserror::Error;

/// Failure to load a parsed document.
#[derive(Debug, Error)]
pub enum IdlError {
    #[error("Failed to read document {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What kind of definition an identifier named, for misuse diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionRole {
    Const,
    Service,
}

impl std::fmt::Display for DefinitionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionRole::Const => write!(f, "value"),
            DefinitionRole::Service => write!(f, "service"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A const or service name used where a type is expected.
    #[error("Identifier {name} is a {role} being used as a type")]
    TypeMisuse { name: String, role: DefinitionRole },

    #[error("{}", unknown_identifier_message(.name, .suggestions))]
    UnknownIdentifier {
        name: String,
        suggestions: Vec<Suggestion>,
    },

    #[error("Definition {name} is declared more than once")]
    DuplicateDefinition { name: String },

    /// Internal error: typedef chains are expected to be finite.
    #[error("Typedef cycle detected: {}", .chain.join(" -> "))]
    TypedefCycle { chain: Vec<String> },

    #[error("Unknown enum member {name}")]
    UnknownEnumMember { name: String },
}

fn unknown_identifier_message(name: &str, suggestions: &[Suggestion]) -> String {
    match suggestions.first() {
        Some(suggestion) => format!(
            "Unknown identifier '{}'. Did you mean: {}?",
            name, suggestion.candidate
        ),
        None => format!("Unknown identifier '{}'", name),
    }
}
