//! Pipeline-related API actions

use async_trait::async_trait;
use pipewelder_core::domain::state::PipelineState;
use pipewelder_core::dto::definition::PipelineDefinition;
use pipewelder_core::dto::pipeline::{
    CreatePipeline, CreatePipelineResponse, DescribePipelinesResponse,
};
use pipewelder_core::dto::validation::ValidationResponse;
use serde::Serialize;

use crate::DataPipelineClient;
use crate::error::{ClientError, Result};
use crate::service::SchedulingService;

/// Field of the pipeline description carrying its state
const STATE_FIELD: &str = "@pipelineState";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PipelineIdRequest<'a> {
    pipeline_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribePipelinesRequest<'a> {
    pipeline_ids: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionRequest<'a> {
    pipeline_id: &'a str,
    #[serde(flatten)]
    definition: &'a PipelineDefinition,
}

impl DataPipelineClient {
    // =============================================================================
    // Definitions
    // =============================================================================

    fn definition_request<'a>(
        pipeline_id: &'a str,
        definition: &'a PipelineDefinition,
    ) -> DefinitionRequest<'a> {
        DefinitionRequest {
            pipeline_id,
            definition,
        }
    }
}

/// Flatten a validation response into `<object id>: <message>` lines
fn error_messages(response: &ValidationResponse) -> Vec<String> {
    response
        .validation_errors
        .iter()
        .flat_map(|container| {
            container
                .errors
                .iter()
                .map(move |message| format!("{}: {}", container.id, message))
        })
        .collect()
}

#[async_trait]
impl SchedulingService for DataPipelineClient {
    async fn create_pipeline(&self, req: CreatePipeline) -> Result<String> {
        let response: CreatePipelineResponse = self.call("CreatePipeline", &req).await?;
        Ok(response.pipeline_id)
    }

    async fn put_definition(&self, pipeline_id: &str, definition: &PipelineDefinition) -> Result<()> {
        let response: ValidationResponse = self
            .call(
                "PutPipelineDefinition",
                &Self::definition_request(pipeline_id, definition),
            )
            .await?;

        if response.errored {
            return Err(ClientError::Rejected {
                action: "PutPipelineDefinition",
                errors: error_messages(&response),
            });
        }

        Ok(())
    }

    async fn validate_definition(
        &self,
        pipeline_id: &str,
        definition: &PipelineDefinition,
    ) -> Result<ValidationResponse> {
        self.call(
            "ValidatePipelineDefinition",
            &Self::definition_request(pipeline_id, definition),
        )
        .await
    }

    async fn describe_definition(&self, pipeline_id: &str) -> Result<PipelineDefinition> {
        self.call("GetPipelineDefinition", &PipelineIdRequest { pipeline_id })
            .await
    }

    async fn describe_state(&self, pipeline_id: &str) -> Result<PipelineState> {
        let response: DescribePipelinesResponse = self
            .call(
                "DescribePipelines",
                &DescribePipelinesRequest {
                    pipeline_ids: [pipeline_id],
                },
            )
            .await?;

        let description = response
            .pipeline_description_list
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(pipeline_id.to_string()))?;

        description
            .field_value(STATE_FIELD)
            .map(PipelineState::from)
            .ok_or_else(|| {
                ClientError::ParseError(format!(
                    "Pipeline {} has no {} field",
                    pipeline_id, STATE_FIELD
                ))
            })
    }

    async fn activate(&self, pipeline_id: &str) -> Result<()> {
        self.call_empty("ActivatePipeline", &PipelineIdRequest { pipeline_id })
            .await
    }

    async fn delete(&self, pipeline_id: &str) -> Result<()> {
        self.call_empty("DeletePipeline", &PipelineIdRequest { pipeline_id })
            .await
    }
}
