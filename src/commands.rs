//! Text command front end: `/start`, `/status` and `/get_failures`.
//!
//! Date arguments are validated here, so the query service only ever sees
//! well-formed dates.

use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

use crate::query::QueryService;
use crate::tracker::StatusTracker;

pub const GREETING: &str =
    "Hi! I watch the configured servers and report when they go down or come back.";
pub const HELP: &str = "Commands:\n/status - current state of every server\n/get_failures <YYYY-MM-DD> <YYYY-MM-DD> - failures in a date range";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryInputError {
    #[error("Usage: /get_failures <YYYY-MM-DD> <YYYY-MM-DD>")]
    Usage,
    #[error("Invalid date format. Use YYYY-MM-DD.")]
    InvalidDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    GetFailures { start: NaiveDate, end: NaiveDate },
    Help,
}

pub fn parse_date(arg: &str) -> Result<NaiveDate, QueryInputError> {
    NaiveDate::parse_from_str(arg, "%Y-%m-%d").map_err(|_| QueryInputError::InvalidDate)
}

impl Command {
    pub fn parse(text: &str) -> Result<Self, QueryInputError> {
        let mut words = text.split_whitespace();
        let head = words.next().unwrap_or_default();
        // Chat clients may address a bot as `/status@some_bot`.
        let name = head.split('@').next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        match name {
            "/start" => Ok(Command::Start),
            "/status" => Ok(Command::Status),
            "/get_failures" => {
                let [start, end] = args.as_slice() else {
                    return Err(QueryInputError::Usage);
                };
                Ok(Command::GetFailures {
                    start: parse_date(start)?,
                    end: parse_date(end)?,
                })
            }
            _ => Ok(Command::Help),
        }
    }
}

#[derive(Clone)]
pub struct CommandHandler {
    tracker: Arc<StatusTracker>,
    queries: QueryService,
}

impl CommandHandler {
    pub fn new(tracker: Arc<StatusTracker>, queries: QueryService) -> Self {
        Self { tracker, queries }
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub async fn status_text(&self) -> String {
        self.tracker
            .snapshot()
            .await
            .iter()
            .map(|s| {
                let state = if s.reachable { "✅ online" } else { "❌ offline" };
                format!("{} ({}): {}", s.name, s.address, state)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn failures_text(&self, start: NaiveDate, end: NaiveDate) -> String {
        self.queries.failures_between(start, end).to_string()
    }

    /// Reply text for one incoming command.
    pub async fn dispatch(&self, text: &str) -> String {
        match Command::parse(text) {
            Ok(Command::Start) => GREETING.to_string(),
            Ok(Command::Status) => self.status_text().await,
            Ok(Command::GetFailures { start, end }) => {
                let queries = self.queries.clone();
                // Partition scans are blocking file reads.
                tokio::task::spawn_blocking(move || queries.failures_between(start, end).to_string())
                    .await
                    .unwrap_or_else(|e| format!("Query failed: {}", e))
            }
            Ok(Command::Help) => HELP.to_string(),
            Err(e) => e.to_string(),
        }
    }
}
