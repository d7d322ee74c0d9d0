use crate::{StandardTransform, Transformation};
use etl_core::{run_with_retry, Result, RetryPolicy, TaskDescriptor, TaskError, TaskOutcome};
use etl_log::{Clock, StructuredLogger, SystemClock};
use etl_storage::{encode_parquet, Dataset, ObjectLocation, ObjectStore};
use std::sync::Arc;
use std::time::Duration;

const MODULE: &str = "Transform";

pub fn load_descriptor() -> TaskDescriptor {
    TaskDescriptor::new("transform_and_save_parquet", MODULE)
        .with_description("Transforms a dataset and saves it back to MinIO/S3")
        .with_policy(RetryPolicy::new(2, Duration::from_secs(20)))
}

/// Applies a [`Transformation`] to a dataset and writes the result as
/// Parquet to the target location.
pub struct TransformAndLoad {
    store: Arc<dyn ObjectStore>,
    logger: Arc<StructuredLogger>,
    transformation: Arc<dyn Transformation>,
    clock: Arc<dyn Clock>,
    descriptor: TaskDescriptor,
}

impl TransformAndLoad {
    pub fn new(store: Arc<dyn ObjectStore>, logger: Arc<StructuredLogger>) -> Self {
        Self {
            store,
            logger,
            transformation: Arc::new(StandardTransform),
            clock: Arc::new(SystemClock),
            descriptor: load_descriptor(),
        }
    }

    pub fn with_transformation(mut self, transformation: Arc<dyn Transformation>) -> Self {
        self.transformation = transformation;
        self
    }

    /// Clock used for the `processed_at` stamp.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_descriptor(mut self, descriptor: TaskDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    /// Run transform and write under the task's retry policy, returning the
    /// number of rows written.
    pub async fn run(&self, dataset: &Dataset, target: &ObjectLocation) -> TaskOutcome<usize> {
        run_with_retry(&self.descriptor, &self.logger, |_| self.save(dataset, target)).await
    }

    /// A single attempt. An empty dataset is audited as WARN and rejected with
    /// [`TaskError::EmptyInput`] before any write.
    pub async fn save(&self, dataset: &Dataset, target: &ObjectLocation) -> Result<usize> {
        if dataset.num_rows() == 0 {
            self.logger
                .warn(
                    MODULE,
                    "Process",
                    "Empty dataset provided, nothing to transform",
                )
                .await;
            return Err(TaskError::EmptyInput(target.to_string()));
        }

        tracing::debug!(
            "Applying {} transformation to {} rows",
            self.transformation.name(),
            dataset.num_rows()
        );
        let transformed = self.transformation.apply(dataset, self.clock.now())?;
        let data = encode_parquet(&transformed)?;
        self.store.write(target, data).await?;

        self.logger
            .info(
                MODULE,
                "Save",
                &format!("Successfully saved transformed data to {}", target),
            )
            .await;
        Ok(transformed.num_rows())
    }
}
