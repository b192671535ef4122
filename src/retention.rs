use chrono::{Days, NaiveDate};
use std::fs;
use tracing::{info, warn};

use crate::error::Result;
use crate::event_log::EventLog;

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Deletes partitions dated strictly before `now - horizon_days`.
///
/// Files whose names do not carry a partition date are never touched.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    log: EventLog,
    horizon_days: u32,
}

impl RetentionSweeper {
    pub fn new(log: EventLog, horizon_days: u32) -> Self {
        Self { log, horizon_days }
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Returns the dates of the partitions that were removed.
    pub fn sweep(&self, now: NaiveDate) -> Result<Vec<NaiveDate>> {
        let Some(cutoff) = now.checked_sub_days(Days::new(u64::from(self.horizon_days))) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        for (date, path) in self.log.partitions()? {
            if date >= cutoff {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("Removed expired log partition {}", path.display());
                    removed.push(date);
                }
                // Another sweeper may have got there first.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove log partition {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}
