//! In-memory collaborators
//!
//! A control plane and an object store kept in process memory. They record
//! every call, so tests can assert exactly which remote operations a
//! reconciliation issued.

use async_trait::async_trait;
use pipewelder_core::domain::state::PipelineState;
use pipewelder_core::dto::definition::PipelineDefinition;
use pipewelder_core::dto::pipeline::CreatePipeline;
use pipewelder_core::dto::validation::ValidationResponse;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::service::SchedulingService;
use crate::storage::ObjectStorage;

/// A call made against the in-memory control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create { name: String, unique_id: String },
    PutDefinition(String),
    Validate(String),
    DescribeDefinition(String),
    DescribeState(String),
    Activate(String),
    Delete(String),
}

impl RemoteCall {
    /// Whether this call changes remote state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            RemoteCall::PutDefinition(_) | RemoteCall::Activate(_) | RemoteCall::Delete(_)
        )
    }
}

/// A pipeline held by the in-memory control plane
#[derive(Debug, Clone)]
pub struct RemotePipeline {
    pub name: String,
    pub unique_id: String,
    pub description: Option<String>,
    pub state: PipelineState,
    pub definition: PipelineDefinition,
}

type Validator = Box<dyn Fn(&PipelineDefinition) -> ValidationResponse + Send + Sync>;

#[derive(Default)]
struct ControlPlane {
    pipelines: BTreeMap<String, RemotePipeline>,
    calls: Vec<RemoteCall>,
}

/// In-memory implementation of [`SchedulingService`]
///
/// Follows the control plane's rules: creation is idempotent on
/// `(name, unique_id)`, definitions can only be put while a pipeline is
/// `PENDING`, and only a pipeline with a definition can be activated.
pub struct InMemorySchedulingService {
    inner: Mutex<ControlPlane>,
    validator: Validator,
}

impl InMemorySchedulingService {
    /// Creates a control plane that accepts every definition
    pub fn new() -> Self {
        Self::with_validator(|_| ValidationResponse::valid())
    }

    /// Creates a control plane that validates definitions with `validator`
    pub fn with_validator(
        validator: impl Fn(&PipelineDefinition) -> ValidationResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Mutex::new(ControlPlane::default()),
            validator: Box::new(validator),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlPlane> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&RemoteCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(*c)).count()
    }

    /// Snapshot of a stored pipeline
    pub fn pipeline(&self, pipeline_id: &str) -> Option<RemotePipeline> {
        self.lock().pipelines.get(pipeline_id).cloned()
    }

    /// Id of the pipeline created with `name` and `unique_id`, if any
    pub fn find(&self, name: &str, unique_id: &str) -> Option<String> {
        self.lock()
            .pipelines
            .iter()
            .find(|(_, p)| p.name == name && p.unique_id == unique_id)
            .map(|(id, _)| id.clone())
    }

    /// Number of pipelines currently stored
    pub fn pipeline_count(&self) -> usize {
        self.lock().pipelines.len()
    }

    /// Force a pipeline into `state`
    pub fn set_state(&self, pipeline_id: &str, state: PipelineState) {
        if let Some(pipeline) = self.lock().pipelines.get_mut(pipeline_id) {
            pipeline.state = state;
        }
    }

    /// Replace a pipeline's stored definition
    pub fn set_definition(&self, pipeline_id: &str, definition: PipelineDefinition) {
        if let Some(pipeline) = self.lock().pipelines.get_mut(pipeline_id) {
            pipeline.definition = definition;
        }
    }
}

impl Default for InMemorySchedulingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulingService for InMemorySchedulingService {
    async fn create_pipeline(&self, req: CreatePipeline) -> Result<String> {
        let mut plane = self.lock();
        plane.calls.push(RemoteCall::Create {
            name: req.name.clone(),
            unique_id: req.unique_id.clone(),
        });

        let existing = plane
            .pipelines
            .iter()
            .find(|(_, p)| p.name == req.name && p.unique_id == req.unique_id)
            .map(|(id, _)| id.clone());
        if let Some(id) = existing {
            return Ok(id);
        }

        let simple = Uuid::new_v4().simple().to_string().to_uppercase();
        let id = format!("df-{}", &simple[..19]);
        plane.pipelines.insert(
            id.clone(),
            RemotePipeline {
                name: req.name,
                unique_id: req.unique_id,
                description: req.description,
                state: PipelineState::Pending,
                definition: PipelineDefinition::default(),
            },
        );
        Ok(id)
    }

    async fn put_definition(&self, pipeline_id: &str, definition: &PipelineDefinition) -> Result<()> {
        let mut plane = self.lock();
        plane
            .calls
            .push(RemoteCall::PutDefinition(pipeline_id.to_string()));

        let pipeline = plane
            .pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| ClientError::NotFound(pipeline_id.to_string()))?;
        if !pipeline.state.is_pending() {
            return Err(ClientError::api_error(
                400,
                format!(
                    "Pipeline {} is {} and its definition cannot be replaced",
                    pipeline_id, pipeline.state
                ),
            ));
        }
        pipeline.definition = definition.clone();
        Ok(())
    }

    async fn validate_definition(
        &self,
        pipeline_id: &str,
        definition: &PipelineDefinition,
    ) -> Result<ValidationResponse> {
        let mut plane = self.lock();
        plane.calls.push(RemoteCall::Validate(pipeline_id.to_string()));
        if !plane.pipelines.contains_key(pipeline_id) {
            return Err(ClientError::NotFound(pipeline_id.to_string()));
        }
        Ok((self.validator)(definition))
    }

    async fn describe_definition(&self, pipeline_id: &str) -> Result<PipelineDefinition> {
        let mut plane = self.lock();
        plane
            .calls
            .push(RemoteCall::DescribeDefinition(pipeline_id.to_string()));
        plane
            .pipelines
            .get(pipeline_id)
            .map(|p| p.definition.clone())
            .ok_or_else(|| ClientError::NotFound(pipeline_id.to_string()))
    }

    async fn describe_state(&self, pipeline_id: &str) -> Result<PipelineState> {
        let mut plane = self.lock();
        plane
            .calls
            .push(RemoteCall::DescribeState(pipeline_id.to_string()));
        plane
            .pipelines
            .get(pipeline_id)
            .map(|p| p.state.clone())
            .ok_or_else(|| ClientError::NotFound(pipeline_id.to_string()))
    }

    async fn activate(&self, pipeline_id: &str) -> Result<()> {
        let mut plane = self.lock();
        plane.calls.push(RemoteCall::Activate(pipeline_id.to_string()));

        let pipeline = plane
            .pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| ClientError::NotFound(pipeline_id.to_string()))?;
        if pipeline.definition.is_empty() {
            return Err(ClientError::api_error(
                400,
                format!("Pipeline {} has no definition", pipeline_id),
            ));
        }
        pipeline.state = PipelineState::Scheduled;
        Ok(())
    }

    async fn delete(&self, pipeline_id: &str) -> Result<()> {
        let mut plane = self.lock();
        plane.calls.push(RemoteCall::Delete(pipeline_id.to_string()));
        plane
            .pipelines
            .remove(pipeline_id)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(pipeline_id.to_string()))
    }
}

/// In-memory implementation of [`ObjectStorage`]
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Contents of an object
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Every key in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .keys(bucket)
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let mut objects = self.lock();
        for key in keys {
            objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.lock().insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewelder_core::dto::definition::ApiParameterValue;

    fn create(name: &str, unique_id: &str) -> CreatePipeline {
        CreatePipeline {
            name: name.to_string(),
            unique_id: unique_id.to_string(),
            description: None,
            tags: Vec::new(),
        }
    }

    fn definition() -> PipelineDefinition {
        PipelineDefinition {
            values: vec![ApiParameterValue {
                id: "myName".to_string(),
                string_value: "echoer".to_string(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let service = InMemorySchedulingService::new();
        let a = service.create_pipeline(create("etl", "u1")).await.unwrap();
        let b = service.create_pipeline(create("etl", "u1")).await.unwrap();
        let c = service.create_pipeline(create("etl", "u2")).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(service.pipeline_count(), 2);
        assert!(a.starts_with("df-"));
    }

    #[tokio::test]
    async fn test_put_only_while_pending() {
        let service = InMemorySchedulingService::new();
        let id = service.create_pipeline(create("etl", "u1")).await.unwrap();

        service.put_definition(&id, &definition()).await.unwrap();
        service.activate(&id).await.unwrap();
        assert_eq!(service.describe_state(&id).await.unwrap(), PipelineState::Scheduled);

        let err = service.put_definition(&id, &definition()).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_activate_requires_definition() {
        let service = InMemorySchedulingService::new();
        let id = service.create_pipeline(create("etl", "u1")).await.unwrap();
        assert!(service.activate(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_frees_identity() {
        let service = InMemorySchedulingService::new();
        let id = service.create_pipeline(create("etl", "u1")).await.unwrap();
        service.delete(&id).await.unwrap();
        assert!(service.describe_state(&id).await.unwrap_err().is_not_found());

        let recreated = service.create_pipeline(create("etl", "u1")).await.unwrap();
        assert_ne!(id, recreated);
        assert!(service.pipeline(&recreated).unwrap().state.is_pending());
    }

    #[tokio::test]
    async fn test_calls_recorded() {
        let service = InMemorySchedulingService::new();
        let id = service.create_pipeline(create("etl", "u1")).await.unwrap();
        service.describe_definition(&id).await.unwrap();

        assert_eq!(
            service.calls(),
            vec![
                RemoteCall::Create {
                    name: "etl".to_string(),
                    unique_id: "u1".to_string()
                },
                RemoteCall::DescribeDefinition(id),
            ]
        );
        assert_eq!(service.count_calls(RemoteCall::is_mutation), 0);
    }

    #[tokio::test]
    async fn test_custom_validator() {
        let service = InMemorySchedulingService::with_validator(|_| {
            ValidationResponse::with_errors("Default", vec!["bad".to_string()])
        });
        let id = service.create_pipeline(create("stub", "stub")).await.unwrap();
        let response = service
            .validate_definition(&id, &definition())
            .await
            .unwrap();
        assert!(!response.is_valid());
    }

    #[tokio::test]
    async fn test_object_storage() {
        let storage = InMemoryObjectStorage::new();
        storage.put_object("b", "p/tasks/a", vec![1]).await.unwrap();
        storage.put_object("b", "p/run", vec![2]).await.unwrap();

        let tasks = storage.list_objects("b", "p/tasks").await.unwrap();
        assert_eq!(tasks, vec!["p/tasks/a".to_string()]);

        storage.delete_objects("b", &tasks).await.unwrap();
        assert_eq!(storage.keys("b"), vec!["p/run".to_string()]);
        assert_eq!(storage.get("b", "p/run"), Some(vec![2]));
    }
}
