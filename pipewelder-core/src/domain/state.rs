//! Remote pipeline state

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a pipeline as reported by the scheduling control plane
///
/// Only `Pending` (created, never activated) is treated specially: it is the
/// only state from which a definition may be pushed directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PipelineState {
    Pending,
    Scheduled,
    Finished,
    Failed,
    Other(String),
}

impl PipelineState {
    /// Whether the pipeline has never had a definition activated
    pub fn is_pending(&self) -> bool {
        matches!(self, PipelineState::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PipelineState::Pending => "PENDING",
            PipelineState::Scheduled => "SCHEDULED",
            PipelineState::Finished => "FINISHED",
            PipelineState::Failed => "FAILED",
            PipelineState::Other(s) => s,
        }
    }
}

impl From<&str> for PipelineState {
    fn from(s: &str) -> Self {
        match s {
            "PENDING" => PipelineState::Pending,
            "SCHEDULED" => PipelineState::Scheduled,
            "FINISHED" => PipelineState::Finished,
            "FAILED" => PipelineState::Failed,
            other => PipelineState::Other(other.to_string()),
        }
    }
}

impl From<String> for PipelineState {
    fn from(s: String) -> Self {
        PipelineState::from(s.as_str())
    }
}

impl From<PipelineState> for String {
    fn from(state: PipelineState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
