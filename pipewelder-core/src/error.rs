//! Error types for template instantiation

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while loading a template or instantiating a pipeline
#[derive(Debug, Error)]
pub enum CoreError {
    /// A placeholder chain ended at a key with no value and no default
    #[error("No value or default found for '{key}' (unresolved reference '{unresolved}')")]
    MissingValue {
        /// The key originally requested
        key: String,
        /// The key in the chain that could not be resolved
        unresolved: String,
    },

    /// A placeholder chain referred back to a key already being resolved
    #[error("Cyclic reference while resolving '{key}': {chain}")]
    CyclicReference {
        /// The key originally requested
        key: String,
        /// The chain of keys, e.g. `myA -> myB -> myA`
        chain: String,
    },

    /// A value that must be a single string is a list
    #[error("Value for '{0}' must be a single string")]
    NonScalarValue(String),

    /// Schedule period does not match `<integer> <unit>`
    #[error("'{0}' cannot be parsed as a period")]
    InvalidPeriod(String),

    /// Timestamp does not match `YYYY-MM-DDTHH:MM:SS`
    #[error("'{0}' cannot be parsed as a timestamp")]
    InvalidTimestamp(String),

    /// Tag entry is not of the form `key:value`
    #[error("Tag '{0}' must be of the form key:value")]
    InvalidTag(String),

    /// Template or values file is not of the expected shape
    #[error("Malformed {kind} at {path}: {message}")]
    MalformedFile {
        /// What kind of file was being read
        kind: &'static str,
        /// Where it was read from
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Template or values document is not of the expected shape
    #[error("Malformed template: {0}")]
    MalformedTemplate(#[from] serde_json::Error),

    /// Failed to read a file
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Check if this error means a key could not be resolved at all
    pub fn is_missing_value(&self) -> bool {
        matches!(self, Self::MissingValue { .. })
    }

    /// I/O failure on `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
