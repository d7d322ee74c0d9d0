//! Date-partitioned, append-only audit log.
//!
//! Every pipeline step reports through a [`StructuredLogger`], which writes one
//! pipe-delimited row per call into a file named after the current local date.
//! Rows are never rewritten; a new partition file starts on the first write
//! after the date changes.

pub mod clock;
pub mod error;
pub mod logger;
pub mod record;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use logger::{LoggerConfig, StructuredLogger};
pub use record::{LogMode, LogRecord};
