use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::CheckType;

/// A monitored address plus its display name. `address` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub check: CheckType,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            check: CheckType::Ping,
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.address)
    }
}

/// Outcome of one reachability check. Failures are ordinary values.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Reachable { latency_ms: f64 },
    Unreachable,
    ProbeError { message: String },
}

impl ProbeResult {
    pub fn is_up(&self) -> bool {
        matches!(self, ProbeResult::Reachable { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentDown,
    WentUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Level::Warning | Level::Error)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Level::Info),
            "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            _ => Err(()),
        }
    }
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";
const FIELD_SEPARATOR: &str = " - ";

/// One line of a log partition: `<timestamp> - <LEVEL> - <message>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: NaiveDateTime,
    pub level: Level,
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp: NaiveDateTime, level: Level, message: impl Into<String>) -> Self {
        // Embedded newlines would split one event across lines.
        let message = message.into().replace(['\r', '\n'], " ");
        Self { timestamp, level, message }
    }

    pub fn now(level: Level, message: impl Into<String>) -> Self {
        Self::new(chrono::Local::now().naive_local(), level, message)
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            FIELD_SEPARATOR,
            self.level,
            FIELD_SEPARATOR,
            self.message
        )
    }

    /// Returns `None` for anything that is not a well-formed event line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(3, FIELD_SEPARATOR);
        let timestamp = parts.next()?;
        let level = parts.next()?;
        let message = parts.next()?;

        let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
        let level = level.parse().ok()?;
        Some(Self {
            timestamp,
            level,
            message: message.to_string(),
        })
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Read-only view of one endpoint for status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub name: String,
    pub address: String,
    pub reachable: bool,
}
