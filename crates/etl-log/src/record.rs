use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FIELD_SEPARATOR: &str = " | ";
pub const ROW_SEPARATOR: char = '\n';
pub const HEADERS: [&str; 5] = ["MODE", "CREATED_AT", "MODULE", "MESSAGE", "OBS"];
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogMode {
    Info,
    Warn,
    Error,
}

impl LogMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogMode::Info => "INFO",
            LogMode::Warn => "WARN",
            LogMode::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INFO" => Some(LogMode::Info),
            "WARN" => Some(LogMode::Warn),
            "ERROR" => Some(LogMode::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the audit trail. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub mode: LogMode,
    pub created_at: NaiveDateTime,
    pub module: String,
    pub primary_message: String,
    pub observation: Option<String>,
}

impl LogRecord {
    /// Build a record, stripping line breaks so it always occupies one row.
    pub fn new(
        mode: LogMode,
        created_at: NaiveDateTime,
        module: &str,
        primary_message: &str,
        observation: Option<&str>,
    ) -> Self {
        Self {
            mode,
            created_at,
            module: strip_line_breaks(module),
            primary_message: strip_line_breaks(primary_message),
            observation: observation.map(strip_line_breaks),
        }
    }

    /// Header row written once at the top of every partition.
    pub fn header_line() -> String {
        let mut line = HEADERS.join(FIELD_SEPARATOR);
        line.push(ROW_SEPARATOR);
        line
    }

    /// Serialize to a delimited row, newline terminated.
    pub fn to_line(&self) -> String {
        let created_at = self.created_at.format(TIMESTAMP_FORMAT).to_string();
        let fields = [
            self.mode.as_str(),
            created_at.as_str(),
            self.module.as_str(),
            self.primary_message.as_str(),
            self.observation.as_deref().unwrap_or(""),
        ];

        let mut line = fields.join(FIELD_SEPARATOR);
        line.push(ROW_SEPARATOR);
        line
    }

    /// Parse a row produced by [`LogRecord::to_line`]. Returns `None` for the
    /// header row or anything malformed.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.strip_suffix(ROW_SEPARATOR).unwrap_or(line);
        let mut fields = line.splitn(HEADERS.len(), FIELD_SEPARATOR);

        let mode = LogMode::parse(fields.next()?)?;
        let created_at = NaiveDateTime::parse_from_str(fields.next()?, TIMESTAMP_FORMAT).ok()?;
        let module = fields.next()?.to_string();
        let primary_message = fields.next()?.to_string();
        let observation = fields
            .next()
            .filter(|obs| !obs.is_empty())
            .map(str::to_string);

        Some(Self {
            mode,
            created_at,
            module,
            primary_message,
            observation,
        })
    }
}

fn strip_line_breaks(value: &str) -> String {
    value.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}
