use crate::{
    clock::{Clock, SystemClock},
    error::Error,
    record::{LogMode, LogRecord},
    Result,
};
use chrono::NaiveDateTime;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const PARTITION_FORMAT: &str = "%Y_%m_%d";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Directory holding the partition files
    pub dir: PathBuf,
    /// Optional tag inserted before the `.log` extension
    pub format_tag: Option<String>,
    /// Deployment tag (dev, staging, prod, ...)
    pub environment: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("log"),
            format_tag: None,
            environment: "dev".to_string(),
        }
    }
}

/// Append-only audit writer, one partition file per local calendar day.
///
/// The partition is derived from the clock on every write, so a logger that
/// lives across midnight starts a fresh file (with its own header) on the
/// first record of the new day.
pub struct StructuredLogger {
    dir: PathBuf,
    extension: String,
    environment: String,
    clock: Arc<dyn Clock>,
    // Held across header creation and append; remembers the last partition
    // that is known to carry a header.
    active: Mutex<Option<PathBuf>>,
}

impl StructuredLogger {
    pub fn new(config: LoggerConfig) -> Self {
        let extension = match config.format_tag.as_deref().map(sanitize_tag) {
            Some(tag) if !tag.is_empty() => format!(".{}.log", tag),
            _ => ".log".to_string(),
        };

        Self {
            dir: config.dir,
            extension,
            environment: config.environment,
            clock: Arc::new(SystemClock),
            active: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Path of the partition that a write issued right now would land in.
    pub fn partition_path(&self) -> PathBuf {
        self.partition_for(self.clock.now())
    }

    fn partition_for(&self, at: NaiveDateTime) -> PathBuf {
        let key = at.format(PARTITION_FORMAT);
        self.dir.join(format!("{}{}", key, self.extension))
    }

    /// Create the log directory and today's partition with its header.
    ///
    /// Safe to call repeatedly or concurrently; an existing partition is left
    /// untouched.
    pub async fn initialize(&self) -> Result<PathBuf> {
        let mut active = self.active.lock().await;
        let path = self.partition_path();

        self.ensure_partition(&path).await?;
        *active = Some(path.clone());

        tracing::debug!("Log partition ready: {}", path.display());
        Ok(path)
    }

    /// Append one record to the current partition.
    ///
    /// The file is opened, written and flushed per call; nothing is buffered
    /// in memory between calls.
    pub async fn log(
        &self,
        mode: LogMode,
        module: &str,
        category: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        let record = LogRecord::new(mode, self.clock.now(), module, category, detail);
        self.append(&record).await
    }

    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        mirror(record);

        let path = self.partition_for(record.created_at);
        let mut active = self.active.lock().await;

        if active.as_deref() != Some(path.as_path()) {
            self.ensure_partition(&path).await?;
            *active = Some(path.clone());
        }

        let write_err = |source| Error::Write {
            path: path.clone(),
            source,
        };

        // A partition removed behind our back (rotation, cleanup) is
        // recreated with its header rather than as a bare append.
        let mut file = match open_append(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.ensure_partition(&path).await?;
                open_append(&path).await.map_err(write_err)?
            }
            Err(e) => return Err(write_err(e)),
        };
        file.write_all(record.to_line().as_bytes())
            .await
            .map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        Ok(())
    }

    pub async fn info(&self, module: &str, category: &str, detail: &str) {
        self.log_or_stderr(LogMode::Info, module, category, detail).await;
    }

    pub async fn warn(&self, module: &str, category: &str, detail: &str) {
        self.log_or_stderr(LogMode::Warn, module, category, detail).await;
    }

    pub async fn error(&self, module: &str, category: &str, detail: &str) {
        self.log_or_stderr(LogMode::Error, module, category, detail).await;
    }

    // The audit log is itself the failure channel, so a broken write goes to
    // stderr instead of disappearing or failing the caller.
    async fn log_or_stderr(&self, mode: LogMode, module: &str, category: &str, detail: &str) {
        if let Err(e) = self.log(mode, module, category, Some(detail)).await {
            eprintln!(
                "audit log unavailable ({}); dropped {} {} | {} | {}",
                e, mode, module, category, detail
            );
        }
    }

    async fn ensure_partition(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| Error::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let write_err = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(mut file) => {
                file.write_all(LogRecord::header_line().as_bytes())
                    .await
                    .map_err(write_err)?;
                file.flush().await.map_err(write_err)?;
                tracing::info!("Started log partition {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(write_err(e)),
        }
    }
}

async fn open_append(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new().append(true).open(path).await
}

fn mirror(record: &LogRecord) {
    let obs = record.observation.as_deref().unwrap_or("");
    match record.mode {
        LogMode::Info => tracing::info!(
            module = %record.module,
            category = %record.primary_message,
            "{}",
            obs
        ),
        LogMode::Warn => tracing::warn!(
            module = %record.module,
            category = %record.primary_message,
            "{}",
            obs
        ),
        LogMode::Error => tracing::error!(
            module = %record.module,
            category = %record.primary_message,
            "{}",
            obs
        ),
    }
}

fn sanitize_tag(tag: &str) -> String {
    tag.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    struct ManualClock(StdMutex<NaiveDateTime>);

    impl ManualClock {
        fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Arc<Self> {
            let now = NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap();
            Arc::new(Self(StdMutex::new(now)))
        }

        fn set(&self, now: NaiveDateTime) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn logger_in(dir: &TempDir) -> StructuredLogger {
        StructuredLogger::new(LoggerConfig {
            dir: dir.path().join("log"),
            ..Default::default()
        })
    }

    async fn read_lines(path: &Path) -> Vec<String> {
        let content = fs::read_to_string(path).await.unwrap();
        assert!(content.ends_with('\n'));
        content.lines().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_initialize_creates_directory_and_header() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);

        let path = logger.initialize().await.unwrap();

        assert!(path.starts_with(tmp.path().join("log")));
        let lines = read_lines(&path).await;
        assert_eq!(lines, vec!["MODE | CREATED_AT | MODULE | MESSAGE | OBS"]);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let logger = Arc::new(logger_in(&tmp));

        for _ in 0..3 {
            logger.initialize().await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let logger = logger.clone();
            handles.push(tokio::spawn(async move { logger.initialize().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let lines = read_lines(&logger.partition_path()).await;
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_records() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);

        logger.initialize().await.unwrap();
        logger.info("Flow", "Start", "first").await;

        let second = logger_in(&tmp);
        second.initialize().await.unwrap();

        let lines = read_lines(&logger.partition_path()).await;
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_records_appended_in_call_order() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);
        logger.initialize().await.unwrap();

        logger.info("Flow", "Start", "one").await;
        logger.warn("Transform", "Process", "two").await;
        logger.error("S3", "Read", "three").await;

        let lines = read_lines(&logger.partition_path()).await;
        assert_eq!(lines.len(), 4);

        let records: Vec<LogRecord> = lines[1..]
            .iter()
            .map(|l| LogRecord::from_line(l).unwrap())
            .collect();
        assert_eq!(records[0].mode, LogMode::Info);
        assert_eq!(records[1].mode, LogMode::Warn);
        assert_eq!(records[2].mode, LogMode::Error);
        assert_eq!(records[2].observation.as_deref(), Some("three"));
    }

    #[tokio::test]
    async fn test_log_without_initialize_writes_header_first() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);

        logger
            .log(LogMode::Info, "Flow", "Start", None)
            .await
            .unwrap();

        let lines = read_lines(&logger.partition_path()).await;
        assert_eq!(lines[0], "MODE | CREATED_AT | MODULE | MESSAGE | OBS");
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_removed_partition_recreated_with_header() {
        let tmp = TempDir::new().unwrap();
        let logger = logger_in(&tmp);

        logger.initialize().await.unwrap();
        logger.info("Flow", "Start", "before rotation").await;
        fs::remove_file(logger.partition_path()).await.unwrap();

        logger
            .log(LogMode::Info, "Flow", "Complete", Some("after rotation"))
            .await
            .unwrap();

        let lines = read_lines(&logger.partition_path()).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "MODE | CREATED_AT | MODULE | MESSAGE | OBS");
        assert!(lines[1].contains("after rotation"));
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_whole_lines() {
        let tmp = TempDir::new().unwrap();
        let logger = Arc::new(logger_in(&tmp));
        logger.initialize().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let logger = logger.clone();
            handles.push(tokio::spawn(async move {
                logger
                    .log(LogMode::Info, "Flow", "Concurrent", Some(&format!("writer {}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let lines = read_lines(&logger.partition_path()).await;
        assert_eq!(lines.len(), 51);
        assert!(lines[1..].iter().all(|l| LogRecord::from_line(l).is_some()));
    }

    #[tokio::test]
    async fn test_partition_rolls_over_at_midnight() {
        let tmp = TempDir::new().unwrap();
        let clock = ManualClock::at(2024, 1, 31, 23, 59);
        let logger = logger_in(&tmp).with_clock(clock.clone());

        let first = logger.initialize().await.unwrap();
        logger.info("Flow", "Start", "before midnight").await;

        clock.set(
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(0, 0, 1)
                .unwrap(),
        );
        logger.info("Flow", "Complete", "after midnight").await;

        let second = logger.partition_path();
        assert_ne!(first, second);
        assert!(first.ends_with("2024_01_31.log"));
        assert!(second.ends_with("2024_02_01.log"));

        assert_eq!(read_lines(&first).await.len(), 2);
        let lines = read_lines(&second).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "MODE | CREATED_AT | MODULE | MESSAGE | OBS");
        assert!(lines[1].contains("after midnight"));
    }

    #[tokio::test]
    async fn test_format_tag_is_sanitized() {
        let tmp = TempDir::new().unwrap();
        let clock = ManualClock::at(2024, 5, 6, 12, 0);
        let logger = StructuredLogger::new(LoggerConfig {
            dir: tmp.path().to_path_buf(),
            format_tag: Some("etl-audit!".to_string()),
            environment: "prod".to_string(),
        })
        .with_clock(clock);

        assert!(logger.partition_path().ends_with("2024_05_06.etlaudit.log"));
        assert_eq!(logger.environment(), "prod");
    }

    #[tokio::test]
    async fn test_unwritable_directory_reports_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, b"file").await.unwrap();

        let logger = StructuredLogger::new(LoggerConfig {
            dir: blocker.join("log"),
            ..Default::default()
        });

        let err = logger.initialize().await.unwrap_err();
        assert!(matches!(err, Error::CreateDir { .. }));

        // Level helpers swallow the failure.
        logger.error("Flow", "Failed", "still returns").await;
    }
}
