//! Pipeline tasks and the flow that sequences them.
//!
//! A flow runs [`Extract`] and then [`TransformAndLoad`], each under its own
//! retry policy, and reports every step to the audit log.

pub mod extract;
pub mod flow;
pub mod load;
pub mod transform;

// Re-exports
pub use extract::{extract_descriptor, Extract};
pub use flow::{FlowParams, FlowPhase, FlowResult, PipelineOrchestrator, FLOW_NAME, FLOW_VERSION};
pub use load::{load_descriptor, TransformAndLoad};
pub use transform::{StandardTransform, Transformation};
