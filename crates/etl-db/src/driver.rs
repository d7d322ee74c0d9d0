use crate::{Error, Result};
use async_trait::async_trait;
use etl_core::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor, Row};

/// Everything needed to open one database connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

impl From<&DatabaseSettings> for ConnectParams {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            user: settings.user.clone(),
            password: settings.password.clone(),
            dbname: settings.name.clone(),
        }
    }
}

/// Opens live handles to an external database.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseHandle>>;
}

/// One live connection. Statements run inside an implicit transaction that
/// stays open until [`DatabaseHandle::commit`].
#[async_trait]
pub trait DatabaseHandle: Send {
    /// Identifier reported in the audit log.
    fn id(&self) -> String;

    /// Run a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a query and read the first column of the first row as an integer.
    async fn fetch_i64(&mut self, sql: &str) -> Result<Option<i64>>;

    async fn commit(&mut self) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseHandle>> {
        let mut options = PgConnectOptions::new().port(params.port);
        if let Some(host) = &params.host {
            options = options.host(host);
        }
        if let Some(user) = &params.user {
            options = options.username(user);
        }
        if let Some(password) = &params.password {
            options = options.password(password);
        }
        if let Some(dbname) = &params.dbname {
            options = options.database(dbname);
        }

        let mut conn = PgConnection::connect_with(&options).await?;
        let backend_pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut conn)
            .await?;

        tracing::debug!("Connected to Postgres, backend pid {}", backend_pid);

        Ok(Box::new(PostgresHandle {
            conn,
            backend_pid,
            in_transaction: false,
        }))
    }
}

pub struct PostgresHandle {
    conn: PgConnection,
    backend_pid: i32,
    in_transaction: bool,
}

impl PostgresHandle {
    async fn begin_if_needed(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.conn.execute("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseHandle for PostgresHandle {
    fn id(&self) -> String {
        self.backend_pid.to_string()
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.begin_if_needed().await?;
        let done = sqlx::query(sql).execute(&mut self.conn).await?;
        Ok(done.rows_affected())
    }

    async fn fetch_i64(&mut self, sql: &str) -> Result<Option<i64>> {
        self.begin_if_needed().await?;
        let Some(row) = sqlx::query(sql).fetch_optional(&mut self.conn).await? else {
            return Ok(None);
        };

        // Postgres integer literals are int4; accept any integer width.
        row.try_get::<Option<i64>, _>(0)
            .or_else(|_| row.try_get::<Option<i32>, _>(0).map(|v| v.map(i64::from)))
            .or_else(|_| row.try_get::<Option<i16>, _>(0).map(|v| v.map(i64::from)))
            .map_err(|e| Error::Query(e.to_string()))
    }

    async fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute("COMMIT").await?;
            self.in_transaction = false;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}
