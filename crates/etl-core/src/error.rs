use thiserror::Error;

/// Failure kinds a pipeline task can end with.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Expected negative results. These are reported by the task itself and
    /// never retried.
    pub fn is_defined_outcome(&self) -> bool {
        matches!(self, TaskError::NotFound(_) | TaskError::EmptyInput(_))
    }

    /// Failures that may succeed on a later attempt without any change to
    /// the input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TaskError::Connection(_) | TaskError::Storage(_) | TaskError::Other(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
