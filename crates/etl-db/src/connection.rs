use crate::{ConnectParams, DatabaseDriver, DatabaseHandle, Error, PostgresDriver, Result};
use etl_core::DatabaseSettings;
use etl_log::StructuredLogger;
use futures_util::future::{BoxFuture, FutureExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

const MODULE: &str = "Database";

/// A single database connection with audited, idempotent release.
///
/// `connect()` never fails loudly: a failed attempt is written to the audit
/// log and leaves the connection unconnected, so callers check
/// [`ScopedConnection::is_connected`] (or get `None` from
/// [`ScopedConnection::cursor`]) before issuing work.
pub struct ScopedConnection {
    params: ConnectParams,
    driver: Arc<dyn DatabaseDriver>,
    logger: Arc<StructuredLogger>,
    handle: Option<Box<dyn DatabaseHandle>>,
    last_error: Option<Error>,
}

impl ScopedConnection {
    pub fn new(
        params: ConnectParams,
        driver: Arc<dyn DatabaseDriver>,
        logger: Arc<StructuredLogger>,
    ) -> Self {
        Self {
            params,
            driver,
            logger,
            handle: None,
            last_error: None,
        }
    }

    /// Postgres connection configured from `PG_*` settings.
    pub fn postgres(settings: &DatabaseSettings, logger: Arc<StructuredLogger>) -> Self {
        Self::new(settings.into(), Arc::new(PostgresDriver), logger)
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub fn id(&self) -> Option<String> {
        self.handle.as_ref().map(|handle| handle.id())
    }

    /// Error of the most recent failed connection attempt.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Open the connection. Returns whether a live handle is held afterwards.
    pub async fn connect(&mut self) -> bool {
        if self.handle.is_some() {
            return true;
        }

        match self.driver.connect(&self.params).await {
            Ok(handle) => {
                let detail = format!("New. ID: {}", handle.id());
                self.logger.info(MODULE, "Connection", &detail).await;
                self.handle = Some(handle);
                self.last_error = None;
                true
            }
            Err(e) => {
                self.logger
                    .error(MODULE, "Error while connecting", &e.to_string())
                    .await;
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Cursor over the live handle, `None` while unconnected.
    pub fn cursor(&mut self) -> Option<Cursor<'_>> {
        self.handle.as_mut().map(|handle| Cursor { handle })
    }

    pub async fn commit(&mut self) -> Result<()> {
        match self.handle.as_mut() {
            Some(handle) => handle.commit().await,
            None => Err(Error::NotConnected),
        }
    }

    /// Commit pending work and release the handle. No-op when unconnected,
    /// so calling it twice is harmless.
    pub async fn close(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        let id = handle.id();
        if let Err(e) = handle.commit().await {
            self.logger
                .error(MODULE, "Commit", &format!("ID: {}. {}", id, e))
                .await;
        }
        if let Err(e) = handle.close().await {
            self.logger
                .error(MODULE, "Close", &format!("ID: {}. {}", id, e))
                .await;
        }

        self.logger
            .info(MODULE, "Connection", &format!("Closed. ID: {}", id))
            .await;
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            tracing::warn!(
                "Connection {} dropped without close; uncommitted work is discarded",
                handle.id()
            );
        }
    }
}

/// Statement access tied to a live connection; it cannot outlive the
/// borrow of its [`ScopedConnection`].
pub struct Cursor<'a> {
    handle: &'a mut Box<dyn DatabaseHandle>,
}

impl Cursor<'_> {
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.handle.execute(sql).await
    }

    pub async fn fetch_i64(&mut self, sql: &str) -> Result<Option<i64>> {
        self.handle.fetch_i64(sql).await
    }
}

/// Connect, run `f`, then close exactly once, whether `f` returns normally,
/// returns an error value or panics.
///
/// `f` receives the connection even when connecting failed; it must check
/// for a live handle before use.
pub async fn with_connection<T, F>(mut conn: ScopedConnection, f: F) -> T
where
    F: for<'c> FnOnce(&'c mut ScopedConnection) -> BoxFuture<'c, T>,
{
    conn.connect().await;

    // Building the future runs caller code too, so it happens under the guard.
    let scoped = &mut conn;
    let result = AssertUnwindSafe(async move { f(scoped).await })
        .catch_unwind()
        .await;
    conn.close().await;

    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
