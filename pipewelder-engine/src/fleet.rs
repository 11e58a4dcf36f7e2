//! Fleet coordination
//!
//! A fleet is every pipeline instantiated from one template. Batch
//! operations visit every pipeline in name order, keep going after a
//! failure, and report one outcome per pipeline.

use pipewelder_client::{ObjectStorage, SchedulingService};
use pipewelder_core::PipelineInstance;
use pipewelder_core::domain::template::Template;
use pipewelder_core::domain::values::ValueOverrides;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::action::Action;
use crate::error::{EngineError, Result};
use crate::reconcile::{ActivateOutcome, ReconciliationEngine};
use crate::upload::Uploader;

/// How one pipeline fared in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(String),
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Succeeded(message) | Outcome::Failed(message) => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Pipeline name, or the directory for pipelines that failed to load
    pub name: String,
    pub outcome: Outcome,
}

impl BatchEntry {
    fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Failed(message.into()),
        }
    }
}

/// Per-pipeline outcomes of one batch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub action: Action,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    fn new(action: Action) -> Self {
        Self {
            action,
            entries: Vec::new(),
        }
    }

    /// True only if every pipeline succeeded
    pub fn succeeded(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.outcome.is_success())
    }
}

/// Owns a template and the pipelines instantiated from it
pub struct FleetCoordinator {
    template: Template,
    pipelines: BTreeMap<String, PipelineInstance>,
    load_failures: Vec<BatchEntry>,
    engine: ReconciliationEngine,
    uploader: Uploader,
}

impl FleetCoordinator {
    pub fn new(
        template: Template,
        service: Arc<dyn SchedulingService>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            template,
            pipelines: BTreeMap::new(),
            load_failures: Vec::new(),
            engine: ReconciliationEngine::new(service),
            uploader: Uploader::new(storage),
        }
    }

    /// Create a coordinator for the template stored at `path`
    pub fn from_template_file(
        path: impl AsRef<Path>,
        service: Arc<dyn SchedulingService>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Result<Self> {
        let template = Template::from_file(path)?;
        Ok(Self::new(template, service, storage))
    }

    // ============================================================================
    // Loading
    // ============================================================================

    /// Instantiate the template for one pipeline directory
    ///
    /// `extra` values are merged over the directory's `values.json`.
    pub fn add_pipeline(
        &mut self,
        dir: impl AsRef<Path>,
        extra: &ValueOverrides,
    ) -> Result<&PipelineInstance> {
        let pipeline = PipelineInstance::from_dir(&self.template, dir, extra)?;
        self.insert(pipeline)
    }

    /// Instantiate every directory in `dirs`; returns how many loaded
    ///
    /// Directories that fail to load are logged and kept as failed entries
    /// in every later batch report.
    pub fn add_pipelines<I, P>(&mut self, dirs: I, extra: &ValueOverrides) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut loaded = 0;
        for dir in dirs {
            let dir = dir.as_ref();
            match self.add_pipeline(dir, extra) {
                Ok(pipeline) => {
                    info!("Loaded pipeline '{}' from {}", pipeline_name(pipeline), dir.display());
                    loaded += 1;
                }
                Err(e) => {
                    warn!("Failed to load pipeline from {}: {}", dir.display(), e);
                    self.load_failures
                        .push(BatchEntry::failed(dir.display().to_string(), e.to_string()));
                }
            }
        }
        loaded
    }

    /// Add an already instantiated pipeline
    pub fn insert(&mut self, pipeline: PipelineInstance) -> Result<&PipelineInstance> {
        let name = pipeline.name()?;
        match self.pipelines.entry(name) {
            Entry::Occupied(entry) => Err(EngineError::DuplicatePipeline(entry.key().clone())),
            Entry::Vacant(entry) => Ok(entry.insert(pipeline)),
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineInstance> {
        self.pipelines.get(name)
    }

    pub fn pipelines(&self) -> impl Iterator<Item = (&str, &PipelineInstance)> {
        self.pipelines.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Directories that could not be instantiated
    pub fn load_failures(&self) -> &[BatchEntry] {
        &self.load_failures
    }

    // ============================================================================
    // Batch operations
    // ============================================================================

    pub async fn run(&self, action: Action) -> BatchReport {
        match action {
            Action::Validate => self.validate_all().await,
            Action::PutDefinition => self.put_definition_all().await,
            Action::Upload => self.upload_all().await,
            Action::Activate => self.activate_all().await,
            Action::Delete => self.delete_all().await,
        }
    }

    pub async fn validate_all(&self) -> BatchReport {
        self.with_load_failures(self.batch(Action::Validate).await)
    }

    pub async fn upload_all(&self) -> BatchReport {
        self.with_load_failures(self.batch(Action::Upload).await)
    }

    pub async fn put_definition_all(&self) -> BatchReport {
        self.with_load_failures(self.batch(Action::PutDefinition).await)
    }

    /// Validate every pipeline, then activate every pipeline
    ///
    /// If any definition is invalid, or any directory failed to load,
    /// nothing is activated; the report then carries those failures and
    /// marks the rest as skipped.
    pub async fn activate_all(&self) -> BatchReport {
        let validation = self.validate_all().await;
        if !validation.succeeded() {
            error!("Validation failed; no pipeline will be activated");
            let mut report = BatchReport::new(Action::Activate);
            report.entries = validation
                .entries
                .into_iter()
                .map(|entry| match entry.outcome {
                    Outcome::Failed(_) => entry,
                    Outcome::Succeeded(_) => BatchEntry::failed(
                        entry.name,
                        "skipped: other pipelines failed validation",
                    ),
                })
                .collect();
            return report;
        }

        self.with_load_failures(self.batch(Action::Activate).await)
    }

    pub async fn delete_all(&self) -> BatchReport {
        self.with_load_failures(self.batch(Action::Delete).await)
    }

    /// Apply `action` to every loaded pipeline without stopping on failure
    async fn batch(&self, action: Action) -> BatchReport {
        let mut report = BatchReport::new(action);
        for (name, pipeline) in &self.pipelines {
            let outcome = match self.apply(action, pipeline).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("'{}' failed for pipeline '{}': {}", action, name, e);
                    Outcome::Failed(e.to_string())
                }
            };
            report.entries.push(BatchEntry {
                name: name.clone(),
                outcome,
            });
        }
        report
    }

    async fn apply(&self, action: Action, pipeline: &PipelineInstance) -> Result<Outcome> {
        let outcome = match action {
            Action::Validate => {
                if self.engine.is_valid(pipeline).await? {
                    Outcome::Succeeded("valid".to_string())
                } else {
                    Outcome::Failed("definition is invalid".to_string())
                }
            }
            Action::PutDefinition => {
                let pipeline_id = self.engine.put_definition(pipeline).await?;
                Outcome::Succeeded(format!("definition put on {}", pipeline_id))
            }
            Action::Upload => {
                let summary = self.uploader.upload(pipeline).await?;
                Outcome::Succeeded(format!(
                    "{} files copied, {} stale objects deleted",
                    summary.copied, summary.deleted
                ))
            }
            Action::Activate => match self.engine.activate(pipeline).await? {
                ActivateOutcome::Unchanged { pipeline_id } => {
                    Outcome::Succeeded(format!("{} already up to date", pipeline_id))
                }
                ActivateOutcome::Activated {
                    pipeline_id,
                    recreated: true,
                } => Outcome::Succeeded(format!("{} recreated and activated", pipeline_id)),
                ActivateOutcome::Activated { pipeline_id, .. } => {
                    Outcome::Succeeded(format!("{} activated", pipeline_id))
                }
            },
            Action::Delete => {
                let pipeline_id = self.engine.delete(pipeline).await?;
                Outcome::Succeeded(format!("{} deleted", pipeline_id))
            }
        };
        Ok(outcome)
    }

    fn with_load_failures(&self, mut report: BatchReport) -> BatchReport {
        report.entries.extend(self.load_failures.iter().cloned());
        report
    }
}

fn pipeline_name(pipeline: &PipelineInstance) -> String {
    pipeline
        .name()
        .unwrap_or_else(|_| pipeline.dir().display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pipeline, template, values};
    use pipewelder_client::memory::{InMemoryObjectStorage, InMemorySchedulingService, RemoteCall};
    use pipewelder_core::dto::definition::PipelineDefinition;
    use pipewelder_core::dto::validation::ValidationResponse;
    use std::fs;
    use tempfile::TempDir;

    fn rejects_bad(definition: &PipelineDefinition) -> ValidationResponse {
        let bad = definition
            .values
            .iter()
            .any(|v| v.id == "myName" && v.string_value == "bad");
        if bad {
            ValidationResponse::with_errors("ShellCommandActivity", vec!["bad command".to_string()])
        } else {
            ValidationResponse::valid()
        }
    }

    fn fleet(
        service: Arc<InMemorySchedulingService>,
        names: &[&str],
    ) -> (FleetCoordinator, Arc<InMemoryObjectStorage>) {
        let storage = Arc::new(InMemoryObjectStorage::new());
        let mut fleet = FleetCoordinator::new(template(), service, storage.clone());
        for name in names {
            fleet.insert(pipeline(name, &[])).unwrap();
        }
        (fleet, storage)
    }

    fn is_validate(call: &RemoteCall) -> bool {
        matches!(call, RemoteCall::Validate(_))
    }

    fn is_activate(call: &RemoteCall) -> bool {
        matches!(call, RemoteCall::Activate(_))
    }

    #[tokio::test]
    async fn test_validate_all_does_not_short_circuit() {
        let service = Arc::new(InMemorySchedulingService::with_validator(rejects_bad));
        let (fleet, _) = fleet(service.clone(), &["alpha", "bad", "gamma"]);

        let report = fleet.validate_all().await;
        assert!(!report.succeeded());
        assert_eq!(report.action, Action::Validate);
        assert_eq!(service.count_calls(is_validate), 3);

        let failed: Vec<_> = report.failures().map(|e| e.name.as_str()).collect();
        assert_eq!(failed, vec!["bad"]);
    }

    #[tokio::test]
    async fn test_activate_all_blocked_by_validation() {
        let service = Arc::new(InMemorySchedulingService::with_validator(rejects_bad));
        let (fleet, _) = fleet(service.clone(), &["alpha", "bad"]);

        let report = fleet.activate_all().await;
        assert_eq!(report.action, Action::Activate);
        assert!(!report.succeeded());
        assert_eq!(report.failures().count(), 2);
        assert_eq!(service.count_calls(RemoteCall::is_mutation), 0);
        assert!(service.find("alpha", &pipeline("alpha", &[]).unique_id().unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_activate_all() {
        let service = Arc::new(InMemorySchedulingService::new());
        let (fleet, _) = fleet(service.clone(), &["alpha", "beta"]);

        let report = fleet.activate_all().await;
        assert!(report.succeeded());
        assert_eq!(report.entries.len(), 2);
        assert_eq!(service.count_calls(is_activate), 2);

        // validation stub plus the two pipelines
        assert_eq!(service.pipeline_count(), 3);

        service.clear_calls();
        let again = fleet.run(Action::Activate).await;
        assert!(again.succeeded());
        assert!(again.entries[0].outcome.message().contains("up to date"));
        assert_eq!(service.count_calls(RemoteCall::is_mutation), 0);
    }

    #[tokio::test]
    async fn test_put_definition_and_delete_all() {
        let service = Arc::new(InMemorySchedulingService::new());
        let (fleet, _) = fleet(service.clone(), &["alpha", "beta"]);

        assert!(fleet.put_definition_all().await.succeeded());
        assert_eq!(service.pipeline_count(), 2);

        assert!(fleet.delete_all().await.succeeded());
        assert_eq!(service.pipeline_count(), 0);
    }

    #[tokio::test]
    async fn test_load_failures_are_reported() {
        let root = TempDir::new().unwrap();
        let good = root.path().join("good");
        let broken = root.path().join("broken");
        fs::create_dir_all(&good).unwrap();
        fs::create_dir_all(&broken).unwrap();
        fs::write(good.join("values.json"), r#"{"values": {"myEnv": "prod"}}"#).unwrap();
        fs::write(broken.join("values.json"), r#"{"mySchedulePeriod": "1 fortnights"}"#).unwrap();

        let service = Arc::new(InMemorySchedulingService::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let mut fleet = FleetCoordinator::new(template(), service.clone(), storage);
        let loaded = fleet.add_pipelines([&good, &broken], &values(&[]));

        assert_eq!(loaded, 1);
        assert!(fleet.pipeline("good").is_some());
        assert_eq!(fleet.load_failures().len(), 1);

        let report = fleet.put_definition_all().await;
        assert!(!report.succeeded());
        assert_eq!(report.entries.len(), 2);
        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].name.ends_with("broken"));
        assert_eq!(
            service.count_calls(|c| matches!(c, RemoteCall::PutDefinition(_))),
            1
        );
    }

    #[tokio::test]
    async fn test_load_failure_blocks_activation() {
        let root = TempDir::new().unwrap();
        let good = root.path().join("good");
        let broken = root.path().join("broken");
        fs::create_dir_all(&good).unwrap();
        fs::create_dir_all(&broken).unwrap();
        fs::write(good.join("values.json"), "{}").unwrap();
        fs::write(broken.join("values.json"), r#"{"mySchedulePeriod": "0 days"}"#).unwrap();

        let service = Arc::new(InMemorySchedulingService::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let mut fleet = FleetCoordinator::new(template(), service.clone(), storage);
        fleet.add_pipelines([&good, &broken], &values(&[]));

        assert!(!fleet.validate_all().await.succeeded());

        let report = fleet.activate_all().await;
        assert_eq!(report.action, Action::Activate);
        assert!(!report.succeeded());
        assert_eq!(report.entries.len(), 2);
        let skipped = report.entries.iter().find(|e| e.name == "good").unwrap();
        assert!(skipped.outcome.message().starts_with("skipped"));
        assert_eq!(service.count_calls(RemoteCall::is_mutation), 0);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let service = Arc::new(InMemorySchedulingService::new());
        let (mut fleet, _) = fleet(service, &["alpha"]);

        let err = fleet.insert(pipeline("alpha", &[])).unwrap_err();
        assert!(matches!(err, EngineError::DuplicatePipeline(ref name) if name == "alpha"));
        assert_eq!(fleet.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_all() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("etl");
        fs::create_dir_all(dir.join("tasks")).unwrap();
        fs::write(dir.join("values.json"), "{}").unwrap();
        fs::write(dir.join("tasks/run.sh"), "echo").unwrap();

        let service = Arc::new(InMemorySchedulingService::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let mut fleet = FleetCoordinator::new(template(), service, storage.clone());
        fleet.add_pipeline(&dir, &values(&[])).unwrap();

        let report = fleet.run(Action::Upload).await;
        assert!(report.succeeded());
        assert_eq!(
            storage.keys("bucket"),
            vec!["pipelines/etl/tasks/run.sh", "pipelines/etl/values.json"]
        );
    }

    #[tokio::test]
    async fn test_from_template_file() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("pipeline_definition.json");
        fs::write(&path, crate::test_support::TEMPLATE).unwrap();

        let service = Arc::new(InMemorySchedulingService::new());
        let storage = Arc::new(InMemoryObjectStorage::new());
        let fleet = FleetCoordinator::from_template_file(&path, service, storage).unwrap();
        assert_eq!(fleet.template().parameters.len(), 5);
        assert!(fleet.is_empty());
    }
}
