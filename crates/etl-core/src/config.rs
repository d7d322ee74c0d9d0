//! Environment-sourced settings.
//!
//! Variable names follow the deployment `.env` file: `PG_*` for the
//! database, `S3_*` for the object store, `LOG_PATH`/`LOG_FORMAT` for the
//! audit log and `ENV` for the deployment tag.

use config::{Config, ConfigBuilder, ConfigError, Environment};
use config::builder::DefaultState;
use etl_log::LoggerConfig;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreSettings {
    pub host: Option<String>,
    pub port: u16,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    pub allow_http: bool,
}

impl ObjectStoreSettings {
    /// `http://host:port`, or the host itself when it already names a scheme.
    pub fn endpoint(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        if host.starts_with("http://") || host.starts_with("https://") {
            Some(host.to_string())
        } else {
            Some(format!("http://{}:{}", host, self.port))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub dir: PathBuf,
    pub format_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub object_store: ObjectStoreSettings,
    pub log: LogSettings,
    pub environment: String,
}

// Flat view of the environment, keys lowercased by `config`.
#[derive(Debug, Deserialize)]
struct RawSettings {
    pg_host: Option<String>,
    pg_port: u16,
    pg_user: Option<String>,
    pg_password: Option<String>,
    pg_name: Option<String>,
    s3_host: Option<String>,
    s3_port: u16,
    s3_user: Option<String>,
    s3_password: Option<String>,
    s3_region: String,
    s3_allow_http: bool,
    log_path: String,
    log_format: Option<String>,
    env: String,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let builder = defaults()?.add_source(Environment::default());
        Self::build(builder)
    }

    /// Read settings from explicit `NAME=value` pairs instead of the process
    /// environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = defaults()?;
        for (key, value) in vars {
            builder = builder.set_override(key.as_ref().to_lowercase(), value.into())?;
        }
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;

        Ok(Self {
            database: DatabaseSettings {
                host: raw.pg_host,
                port: raw.pg_port,
                user: raw.pg_user,
                password: raw.pg_password,
                name: raw.pg_name,
            },
            object_store: ObjectStoreSettings {
                host: raw.s3_host,
                port: raw.s3_port,
                access_key: raw.s3_user,
                secret_key: raw.s3_password,
                region: raw.s3_region,
                allow_http: raw.s3_allow_http,
            },
            log: LogSettings {
                dir: PathBuf::from(raw.log_path),
                format_tag: raw.log_format,
            },
            environment: raw.env,
        })
    }

    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            dir: self.log.dir.clone(),
            format_tag: self.log.format_tag.clone(),
            environment: self.environment.clone(),
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("pg_port", 5432_i64)?
        .set_default("s3_port", 9000_i64)?
        .set_default("s3_region", "us-east-1")?
        .set_default("s3_allow_http", true)?
        .set_default("log_path", "log")?
        .set_default("env", "dev")
}
