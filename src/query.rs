use chrono::NaiveDate;
use std::fmt;

use crate::event_log::EventLog;

pub const NO_FAILURES: &str = "No failures in the given period.";

/// Formatted WARNING/ERROR lines for a date range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureReport {
    pub lines: Vec<String>,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str(NO_FAILURES)
        } else {
            f.write_str(&self.lines.join("\n"))
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryService {
    log: EventLog,
}

impl QueryService {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }

    /// An inverted range yields the empty report without touching the disk.
    pub fn failures_between(&self, start: NaiveDate, end: NaiveDate) -> FailureReport {
        if start > end {
            return FailureReport::default();
        }
        FailureReport {
            lines: self.log.query(start, end).map(|e| e.to_line()).collect(),
        }
    }
}
