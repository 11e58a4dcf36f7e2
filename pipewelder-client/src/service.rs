//! Scheduling control plane interface

use async_trait::async_trait;
use pipewelder_core::domain::state::PipelineState;
use pipewelder_core::dto::definition::PipelineDefinition;
use pipewelder_core::dto::pipeline::CreatePipeline;
use pipewelder_core::dto::validation::ValidationResponse;

use crate::error::Result;

/// Capability set of the remote scheduling service
///
/// Implemented once against the real transport ([`crate::DataPipelineClient`])
/// and once in memory ([`crate::memory::InMemorySchedulingService`]).
#[async_trait]
pub trait SchedulingService: Send + Sync {
    /// Create a pipeline, or return the id of the one already created with
    /// the same name and unique id
    async fn create_pipeline(&self, req: CreatePipeline) -> Result<String>;

    /// Publish a definition onto a pipeline that has not been activated
    async fn put_definition(&self, pipeline_id: &str, definition: &PipelineDefinition) -> Result<()>;

    /// Check a definition against a pipeline without storing it
    async fn validate_definition(
        &self,
        pipeline_id: &str,
        definition: &PipelineDefinition,
    ) -> Result<ValidationResponse>;

    /// Fetch the definition currently stored on a pipeline
    ///
    /// A pipeline with nothing published yet has an empty definition.
    async fn describe_definition(&self, pipeline_id: &str) -> Result<PipelineDefinition>;

    /// Fetch the pipeline's current state
    async fn describe_state(&self, pipeline_id: &str) -> Result<PipelineState>;

    /// Start scheduling runs of the pipeline's definition
    async fn activate(&self, pipeline_id: &str) -> Result<()>;

    /// Delete the pipeline and its definition
    async fn delete(&self, pipeline_id: &str) -> Result<()>;
}
