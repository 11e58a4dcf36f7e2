//! Error types for reconciliation

use pipewelder_client::ClientError;
use pipewelder_core::CoreError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort one pipeline's reconciliation
#[derive(Debug, Error)]
pub enum EngineError {
    /// The pipeline's values could not be resolved
    #[error(transparent)]
    Pipeline(#[from] CoreError),

    /// A remote call failed
    #[error(transparent)]
    Remote(#[from] ClientError),

    /// Destroy-and-recreate did not leave the pipeline `PENDING`
    #[error("Pipeline '{name}' did not converge after {attempts} attempts")]
    NotConverged {
        /// Pipeline name
        name: String,
        /// Reconciliation passes made
        attempts: u32,
    },

    /// Two directories resolved to the same pipeline name
    #[error("Duplicate pipeline name '{0}'")]
    DuplicatePipeline(String),
}
