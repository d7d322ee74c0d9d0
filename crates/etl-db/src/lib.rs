pub mod connection;
pub mod driver;
pub mod error;

// Re-exports
pub use connection::{with_connection, Cursor, ScopedConnection};
pub use driver::{ConnectParams, DatabaseDriver, DatabaseHandle, PostgresDriver};
pub use error::{Error, Result};
