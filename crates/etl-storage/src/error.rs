use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object store configuration: {0}")]
    Config(String),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for etl_core::TaskError {
    fn from(err: Error) -> Self {
        use etl_core::TaskError;

        match err {
            Error::NotFound(what) => TaskError::NotFound(what),
            Error::Config(msg) => TaskError::Connection(msg),
            Error::ObjectStore(object_store::Error::NotFound { path, .. }) => {
                TaskError::NotFound(path)
            }
            Error::ObjectStore(e) => TaskError::Storage(e.to_string()),
            Error::Parquet(e) => TaskError::Codec(e.to_string()),
            Error::Arrow(e) => TaskError::Codec(e.to_string()),
        }
    }
}
