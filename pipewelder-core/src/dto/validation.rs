//! Validation response DTOs

use serde::{Deserialize, Serialize};

/// Result of validating a pipeline definition
///
/// Warnings never make a definition invalid; only `errored` does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub errored: bool,
    #[serde(default)]
    pub validation_warnings: Vec<ValidationWarning>,
    #[serde(default)]
    pub validation_errors: Vec<ValidationError>,
}

/// Warnings raised for one pipeline object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub id: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Errors raised for one pipeline object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub id: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ValidationResponse {
    /// A response with no warnings and no errors
    pub fn valid() -> Self {
        Self::default()
    }

    /// A response reporting `messages` against object `id`
    pub fn with_errors(id: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            errored: true,
            validation_warnings: Vec::new(),
            validation_errors: vec![ValidationError {
                id: id.into(),
                errors: messages,
            }],
        }
    }

    /// Whether the definition passed validation
    ///
    /// A response listing errors is invalid even when `errored` is unset.
    pub fn is_valid(&self) -> bool {
        !self.errored && self.validation_errors.is_empty()
    }
}
