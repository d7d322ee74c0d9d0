//! Object-store access and the columnar file codec used by pipeline tasks.

mod bucket;
pub mod codec;
pub mod error;
pub mod memory;
pub mod s3;
pub mod store;

// Re-exports
pub use codec::{decode_parquet, encode_parquet, Dataset};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use store::{ObjectLocation, ObjectStore};
