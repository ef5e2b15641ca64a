//! Error types for schema melding.

use thiserror::Error;

/// Errors raised by the hashing service for malformed values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// A union must carry at least one option
    #[error("union has no options")]
    EmptyUnion,

    /// A declared fixed-value set must not be empty
    #[error("fixed-value set is empty")]
    EmptyFixedValues,

    /// Map keys are always primitives
    #[error("map key must be a primitive, found {found}")]
    NonPrimitiveMapKey { found: &'static str },
}

/// Errors that can occur while melding or instantiating schemas.
#[derive(Debug, Error)]
pub enum MeldError {
    /// The hashing service rejected a value
    #[error("failed to hash value at `{path}`: {source}")]
    Hash {
        path: String,
        #[source]
        source: HashError,
    },

    /// None of a union's options fit the concrete value
    #[error("no suitable option among {candidates} union alternatives")]
    NoSuitableOption { candidates: usize },

    /// A concrete value does not fit a schema shape
    #[error("value at `{path}` does not conform: expected {expected}, found {found}")]
    Mismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// Failed to parse a witness document
    #[error("failed to parse witness: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MeldError {
    pub(crate) fn hash(path: &str, source: HashError) -> Self {
        MeldError::Hash {
            path: display_path(path).to_string(),
            source,
        }
    }

    pub(crate) fn mismatch(
        path: &str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        MeldError::Mismatch {
            path: display_path(path).to_string(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// The empty path is the root of the value being melded.
pub(crate) fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

/// Result type for melding operations.
pub type MeldResult<T> = Result<T, MeldError>;
