//! Reconciliation engine
//!
//! Compares a pipeline's local definition with what the control plane holds
//! and issues the smallest set of calls that makes them agree:
//!
//! - unchanged definition: nothing
//! - pipeline still `PENDING`: put the definition, then activate
//! - pipeline already activated: delete it, recreate it (it comes back
//!   `PENDING`), put, activate
//!
//! Creation is idempotent on the pipeline's name and unique id, so every
//! operation starts by asking for the pipeline to be created.

use pipewelder_client::SchedulingService;
use pipewelder_core::PipelineInstance;
use pipewelder_core::dto::definition::PipelineDefinition;
use pipewelder_core::dto::pipeline::CreatePipeline;
use pipewelder_core::dto::validation::ValidationResponse;
use pipewelder_core::instance::{PERIOD_KEY, START_KEY};
use pipewelder_core::schedule::{self, NaiveDateTime};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{EngineError, Result};

/// Name of the pipeline definitions are validated against
pub const STUB_NAME: &str = "Pipewelder validation stub";

/// Unique id of the validation stub
pub const STUB_UNIQUE_ID: &str = "stub";

const STUB_DESCRIPTION: &str = "This pipeline should always be in 'PENDING' status.
It is used by Pipewelder to validate pipeline definitions.";

/// Destroy-and-recreate cycles allowed per activation
///
/// A recreated pipeline is always `PENDING`, so one is enough.
const MAX_RECREATIONS: u32 = 1;

/// What `activate` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivateOutcome {
    /// The remote definition already matched; nothing was changed
    Unchanged { pipeline_id: String },
    /// The definition was published and activated
    Activated {
        pipeline_id: String,
        /// Whether an activated pipeline had to be deleted first
        recreated: bool,
    },
}

impl ActivateOutcome {
    pub fn pipeline_id(&self) -> &str {
        match self {
            ActivateOutcome::Unchanged { pipeline_id } => pipeline_id,
            ActivateOutcome::Activated { pipeline_id, .. } => pipeline_id,
        }
    }
}

/// Drives single pipelines through the remote lifecycle
#[derive(Clone)]
pub struct ReconciliationEngine {
    service: Arc<dyn SchedulingService>,
}

impl ReconciliationEngine {
    pub fn new(service: Arc<dyn SchedulingService>) -> Self {
        Self { service }
    }

    /// Create the remote pipeline if it does not exist; returns its id
    pub async fn ensure_created(&self, pipeline: &PipelineInstance) -> Result<String> {
        let req = CreatePipeline {
            name: pipeline.name()?,
            unique_id: pipeline.unique_id()?,
            description: pipeline.description()?,
            tags: pipeline.api_tags()?,
        };
        let pipeline_id = self.service.create_pipeline(req).await?;
        Ok(pipeline_id)
    }

    /// Validate the pipeline's definition with the control plane
    ///
    /// Validation runs against a dedicated stub pipeline that is never
    /// activated. Every warning and error is logged against the object it
    /// concerns; only errors make the definition invalid.
    pub async fn is_valid(&self, pipeline: &PipelineInstance) -> Result<bool> {
        let name = pipeline.name()?;
        let stub_id = self
            .service
            .create_pipeline(CreatePipeline {
                name: STUB_NAME.to_string(),
                unique_id: STUB_UNIQUE_ID.to_string(),
                description: Some(STUB_DESCRIPTION.to_string()),
                tags: Vec::new(),
            })
            .await?;

        let response = self
            .service
            .validate_definition(&stub_id, &pipeline.api_definition())
            .await?;
        log_validation_messages(&name, &response);

        if !response.is_valid() {
            return Ok(false);
        }

        info!("Pipeline '{}' is valid", name);
        Ok(true)
    }

    /// Publish the pipeline's definition; returns the pipeline id
    pub async fn put_definition(&self, pipeline: &PipelineInstance) -> Result<String> {
        let pipeline_id = self.ensure_created(pipeline).await?;
        info!("Putting pipeline definition for {}", pipeline_id);
        self.service
            .put_definition(&pipeline_id, &pipeline.api_definition())
            .await?;
        Ok(pipeline_id)
    }

    /// Make the remote pipeline run the local definition
    pub async fn activate(&self, pipeline: &PipelineInstance) -> Result<ActivateOutcome> {
        let period = pipeline.get_value(PERIOD_KEY)?;
        let now = schedule::now();
        let local = comparable(&pipeline.api_definition(), &period, now);
        let mut recreated = false;

        for attempt in 0..=MAX_RECREATIONS {
            let pipeline_id = self.ensure_created(pipeline).await?;
            let existing = self.service.describe_definition(&pipeline_id).await?;
            let state = self.service.describe_state(&pipeline_id).await?;

            if comparable(&existing, &period, now) == local {
                info!("Pipeline {} is up to date", pipeline_id);
                return Ok(ActivateOutcome::Unchanged { pipeline_id });
            }

            if !state.is_pending() {
                if attempt == MAX_RECREATIONS {
                    error!(
                        "Pipeline {} is still {} after being recreated",
                        pipeline_id, state
                    );
                    break;
                }
                info!(
                    "Pipeline {} is {} with a different definition; recreating it",
                    pipeline_id, state
                );
                self.delete(pipeline).await?;
                recreated = true;
                continue;
            }

            self.put_definition(pipeline).await?;
            info!("Activating pipeline with id {}", pipeline_id);
            self.service.activate(&pipeline_id).await?;
            return Ok(ActivateOutcome::Activated {
                pipeline_id,
                recreated,
            });
        }

        Err(EngineError::NotConverged {
            name: pipeline.name()?,
            attempts: MAX_RECREATIONS + 1,
        })
    }

    /// Delete the remote pipeline; returns the id it had
    pub async fn delete(&self, pipeline: &PipelineInstance) -> Result<String> {
        let pipeline_id = self.ensure_created(pipeline).await?;
        info!("Deleting pipeline with id {}", pipeline_id);
        self.service.delete(&pipeline_id).await?;
        Ok(pipeline_id)
    }
}

/// A definition with its start anchor brought forward to `now`
///
/// The local anchor is re-normalized on every run, so an anchor that only
/// moved by whole periods is not a change. A different time of day is.
fn comparable(
    definition: &PipelineDefinition,
    period: &str,
    now: NaiveDateTime,
) -> PipelineDefinition {
    definition.with_advanced_timestamp(START_KEY, period, now)
}

fn log_validation_messages(name: &str, response: &ValidationResponse) {
    for container in &response.validation_warnings {
        warn!(
            "Warnings in validation response for {} (pipeline '{}')",
            container.id, name
        );
        for message in &container.warnings {
            warn!("  {}", message);
        }
    }
    for container in &response.validation_errors {
        error!(
            "Errors in validation response for {} (pipeline '{}')",
            container.id, name
        );
        for message in &container.errors {
            error!("  {}", message);
        }
    }
}
