//! Mirrors a pipeline directory into object storage
//!
//! The destination is the pipeline's `myS3InputDir`. Objects under its
//! `tasks/` prefix are removed first so files deleted locally disappear
//! remotely too; every file of the pipeline directory is then copied.

use pipewelder_client::{ObjectStorage, StorageLocation, relative_files};
use pipewelder_core::PipelineInstance;
use pipewelder_core::error::CoreError;
use pipewelder_core::instance::INPUT_DIR_KEY;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;

/// Counts of what one upload touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub deleted: usize,
    pub copied: usize,
}

#[derive(Clone)]
pub struct Uploader {
    storage: Arc<dyn ObjectStorage>,
}

impl Uploader {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub async fn upload(&self, pipeline: &PipelineInstance) -> Result<UploadSummary> {
        let input_dir = pipeline.get_value(INPUT_DIR_KEY)?;
        let location = StorageLocation::parse(&input_dir)?;
        let mut summary = UploadSummary::default();

        let tasks_prefix = location.key("tasks/");
        let stale = self
            .storage
            .list_objects(&location.bucket, &tasks_prefix)
            .await?;
        if !stale.is_empty() {
            info!(
                "Deleting {} objects under s3://{}/{}",
                stale.len(),
                location.bucket,
                tasks_prefix
            );
            self.storage.delete_objects(&location.bucket, &stale).await?;
            summary.deleted = stale.len();
        }

        let files = relative_files(pipeline.dir())
            .await
            .map_err(|e| CoreError::io(pipeline.dir(), e))?;
        for relative in files {
            let key = location.key(&relative);
            let path = pipeline.dir().join(&relative);
            let body = tokio::fs::read(&path)
                .await
                .map_err(|e| CoreError::io(&path, e))?;
            info!("Copying {} to s3://{}/{}", path.display(), location.bucket, key);
            self.storage.put_object(&location.bucket, &key, body).await?;
            summary.copied += 1;
        }

        debug!(
            "Upload of {} done: {} deleted, {} copied",
            pipeline.dir().display(),
            summary.deleted,
            summary.copied
        );
        Ok(summary)
    }
}
