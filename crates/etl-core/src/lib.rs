pub mod config;
pub mod error;
pub mod retry;
pub mod task;

// Re-exports
pub use config::{DatabaseSettings, LogSettings, ObjectStoreSettings, Settings};
pub use error::{Result, TaskError};
pub use retry::{run_with_retry, TaskOutcome};
pub use task::{RetryOn, RetryPolicy, TaskDescriptor, TaskRun, TaskStatus};
