use crate::{Extract, TransformAndLoad, Transformation};
use chrono::{DateTime, Utc};
use etl_core::TaskError;
use etl_log::StructuredLogger;
use etl_storage::{ObjectLocation, ObjectStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const FLOW_NAME: &str = "etl_template_flow";
pub const FLOW_VERSION: &str = "1.0.0";

const MODULE: &str = "Flow";

/// Source and target of one flow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowParams {
    pub source: ObjectLocation,
    pub target: ObjectLocation,
}

impl FlowParams {
    pub fn new(source: ObjectLocation, target: ObjectLocation) -> Self {
        Self { source, target }
    }
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            source: ObjectLocation::new("raw-data", "sample/data.parquet"),
            target: ObjectLocation::new("processed-data", "output/processed_data.parquet"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Extract,
    TransformLoad,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowPhase::Extract => write!(f, "extract"),
            FlowPhase::TransformLoad => write!(f, "transform/load"),
        }
    }
}

/// Outcome of one flow run. `success` holds only when every phase succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResult {
    pub run_id: String,
    pub flow: String,
    pub version: String,
    pub success: bool,
    pub rows_extracted: Option<usize>,
    pub rows_written: Option<usize>,
    pub failed_phase: Option<FlowPhase>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FlowResult {
    fn start() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            flow: FLOW_NAME.to_string(),
            version: FLOW_VERSION.to_string(),
            success: false,
            rows_extracted: None,
            rows_written: None,
            failed_phase: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    fn succeed(mut self, rows_written: usize) -> Self {
        self.success = true;
        self.rows_written = Some(rows_written);
        self.completed_at = Some(Utc::now());
        self
    }

    fn fail(mut self, phase: FlowPhase, error: &TaskError) -> Self {
        self.success = false;
        self.failed_phase = Some(phase);
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
        self
    }
}

/// Runs extract then transform-and-load, stopping at the first failed phase.
pub struct PipelineOrchestrator {
    logger: Arc<StructuredLogger>,
    extract: Extract,
    load: TransformAndLoad,
}

impl PipelineOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, logger: Arc<StructuredLogger>) -> Self {
        Self {
            extract: Extract::new(store.clone(), logger.clone()),
            load: TransformAndLoad::new(store, logger.clone()),
            logger,
        }
    }

    pub fn with_extract(mut self, extract: Extract) -> Self {
        self.extract = extract;
        self
    }

    pub fn with_load(mut self, load: TransformAndLoad) -> Self {
        self.load = load;
        self
    }

    pub fn with_transformation(mut self, transformation: Arc<dyn Transformation>) -> Self {
        self.load = self.load.with_transformation(transformation);
        self
    }

    pub async fn run(&self, params: &FlowParams) -> FlowResult {
        let mut result = FlowResult::start();
        tracing::info!(
            "Flow {} v{} run {}: {} -> {}",
            FLOW_NAME,
            FLOW_VERSION,
            result.run_id,
            params.source,
            params.target
        );
        self.logger
            .info(MODULE, "Start", "Starting ETL template flow")
            .await;

        let dataset = match self.extract.run(&params.source).await.into_result() {
            Ok(dataset) => dataset,
            Err(e) => return self.failed(result, FlowPhase::Extract, e).await,
        };

        result.rows_extracted = Some(dataset.num_rows());
        self.logger
            .info(
                MODULE,
                "Extract",
                &format!("Successfully read {} rows from source", dataset.num_rows()),
            )
            .await;

        match self.load.run(&dataset, &params.target).await.into_result() {
            Ok(rows) => {
                self.logger
                    .info(MODULE, "Complete", "ETL process completed successfully")
                    .await;
                result.succeed(rows)
            }
            Err(e) => self.failed(result, FlowPhase::TransformLoad, e).await,
        }
    }

    // The failing task has already written the ERROR record for this run.
    async fn failed(&self, result: FlowResult, phase: FlowPhase, error: TaskError) -> FlowResult {
        tracing::debug!("Flow {} stopped in {} phase: {}", result.run_id, phase, error);
        self.logger
            .warn(
                MODULE,
                "Failed",
                &format!("ETL process failed during {} phase", phase),
            )
            .await;
        result.fail(phase, &error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = FlowParams::default();
        assert_eq!(params.source.to_string(), "raw-data/sample/data.parquet");
        assert_eq!(
            params.target.to_string(),
            "processed-data/output/processed_data.parquet"
        );
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(FlowPhase::Extract.to_string(), "extract");
        assert_eq!(FlowPhase::TransformLoad.to_string(), "transform/load");
    }
}
