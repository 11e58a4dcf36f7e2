//! Pipewelder Engine
//!
//! Drives a fleet of pipelines, all instantiated from one template, towards
//! the state described locally.
//!
//! Architecture:
//! - `ReconciliationEngine`: per-pipeline create/validate/put/activate/delete
//!   against the scheduling control plane
//! - `Uploader`: mirrors a pipeline directory into object storage
//! - `FleetCoordinator`: owns the template and the pipelines, fans each
//!   `Action` out over all of them and reports per-pipeline outcomes

pub mod action;
pub mod error;
pub mod fleet;
pub mod reconcile;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use action::Action;
pub use error::{EngineError, Result};
pub use fleet::{BatchEntry, BatchReport, FleetCoordinator, Outcome};
pub use reconcile::{ActivateOutcome, ReconciliationEngine};
pub use upload::{UploadSummary, Uploader};
