use etl_core::{run_with_retry, Result, RetryPolicy, TaskDescriptor, TaskError, TaskOutcome};
use etl_log::StructuredLogger;
use etl_storage::{decode_parquet, Dataset, ObjectLocation, ObjectStore};
use std::sync::Arc;
use std::time::Duration;

const MODULE: &str = "S3";

pub fn extract_descriptor() -> TaskDescriptor {
    TaskDescriptor::new("read_parquet_from_minio", MODULE)
        .with_description("Reads a Parquet file from MinIO/S3")
        .with_policy(RetryPolicy::new(3, Duration::from_secs(30)))
}

/// Reads a source object and decodes it into a [`Dataset`].
pub struct Extract {
    store: Arc<dyn ObjectStore>,
    logger: Arc<StructuredLogger>,
    descriptor: TaskDescriptor,
}

impl Extract {
    pub fn new(store: Arc<dyn ObjectStore>, logger: Arc<StructuredLogger>) -> Self {
        Self {
            store,
            logger,
            descriptor: extract_descriptor(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: TaskDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    /// Run the extraction under the task's retry policy.
    pub async fn run(&self, source: &ObjectLocation) -> TaskOutcome<Dataset> {
        run_with_retry(&self.descriptor, &self.logger, |_| self.read(source)).await
    }

    /// A single extraction attempt. A missing source is audited as ERROR and
    /// returned as [`TaskError::NotFound`].
    pub async fn read(&self, source: &ObjectLocation) -> Result<Dataset> {
        if !self.store.exists(source).await? {
            return Err(self.not_found(source).await);
        }

        let data = match self.store.read(source).await {
            Ok(data) => data,
            Err(e) => {
                // The object can disappear between the check and the read.
                return match TaskError::from(e) {
                    TaskError::NotFound(_) => Err(self.not_found(source).await),
                    other => Err(other),
                };
            }
        };

        let dataset = decode_parquet(data)?;
        tracing::info!("Read {} rows from {}", dataset.num_rows(), source);
        Ok(dataset)
    }

    async fn not_found(&self, source: &ObjectLocation) -> TaskError {
        self.logger
            .error(MODULE, "Read", &format!("File not found: {}", source))
            .await;
        TaskError::NotFound(source.to_string())
    }
}
