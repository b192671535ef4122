//! Append-only event log partitioned by calendar day.
//!
//! Every day lives in its own file, `server_monitor_<YYYY-MM-DD>.log`, created
//! on the first write of that day. Lines are `<timestamp> - <LEVEL> - <message>`
//! and are never rewritten. Partitions are the unit of both retention and
//! range scanning.

use chrono::{Days, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{MonitorError, Result};
use crate::models::LogEvent;

const PARTITION_PREFIX: &str = "server_monitor_";
const PARTITION_SUFFIX: &str = ".log";
const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn partition_file_name(date: NaiveDate) -> String {
    format!(
        "{}{}{}",
        PARTITION_PREFIX,
        date.format(PARTITION_DATE_FORMAT),
        PARTITION_SUFFIX
    )
}

/// Date embedded in a partition file name, or `None` if the name is not ours.
pub fn parse_partition_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix(PARTITION_PREFIX)?
        .strip_suffix(PARTITION_SUFFIX)?;
    NaiveDate::parse_from_str(date, PARTITION_DATE_FORMAT).ok()
}

#[derive(Debug, Clone)]
pub struct EventLog {
    dir: PathBuf,
}

impl EventLog {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| MonitorError::LogWrite {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(partition_file_name(date))
    }

    /// Appends one line to the partition for `date` and flushes it.
    ///
    /// The file is opened per call so a process running past midnight always
    /// lands in the right day's partition.
    pub fn append(&self, event: &LogEvent, date: NaiveDate) -> Result<()> {
        let path = self.partition_path(date);
        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut line = event.to_line();
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.flush()
        };
        write().map_err(|source| MonitorError::LogWrite { path: path.clone(), source })
    }

    /// Appends to the partition of the event's own timestamp.
    pub fn record(&self, event: &LogEvent) -> Result<()> {
        self.append(event, event.timestamp.date())
    }

    /// Every well-formed event in `[start, end]`, ascending by day, file order within a day.
    pub fn scan(&self, start: NaiveDate, end: NaiveDate) -> Events {
        Events {
            log: self.clone(),
            next_date: (start <= end).then_some(start),
            end,
            reader: None,
            failures_only: false,
        }
    }

    /// WARNING and ERROR events in `[start, end]`. Missing days and malformed
    /// lines are skipped.
    pub fn query(&self, start: NaiveDate, end: NaiveDate) -> Events {
        Events {
            failures_only: true,
            ..self.scan(start, end)
        }
    }

    /// Existing partitions with a recognizable date, sorted by date.
    pub fn partitions(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let read_err = |source| MonitorError::LogRead { path: self.dir.clone(), source };
        let mut partitions = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(date) = parse_partition_date(name) {
                partitions.push((date, path));
            }
        }
        partitions.sort();
        Ok(partitions)
    }
}

/// Lazy scan over a range of partitions.
pub struct Events {
    log: EventLog,
    next_date: Option<NaiveDate>,
    end: NaiveDate,
    reader: Option<BufReader<File>>,
    failures_only: bool,
}

impl Events {
    fn open_next_partition(&mut self) -> bool {
        while let Some(date) = self.next_date {
            self.next_date = date
                .checked_add_days(Days::new(1))
                .filter(|next| *next <= self.end);

            let path = self.log.partition_path(date);
            match File::open(&path) {
                Ok(file) => {
                    self.reader = Some(BufReader::new(file));
                    return true;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => warn!("Skipping unreadable partition {}: {}", path.display(), e),
            }
        }
        false
    }
}

impl Iterator for Events {
    type Item = LogEvent;

    fn next(&mut self) -> Option<LogEvent> {
        let mut buf = Vec::new();
        loop {
            let Some(reader) = self.reader.as_mut() else {
                if !self.open_next_partition() {
                    return None;
                }
                continue;
            };

            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => self.reader = None,
                // An unterminated tail is a line still being written.
                Ok(_) if !buf.ends_with(b"\n") => self.reader = None,
                Ok(_) => {
                    let Some(event) = std::str::from_utf8(&buf).ok().and_then(LogEvent::parse_line)
                    else {
                        continue;
                    };
                    if !self.failures_only || event.level.is_failure() {
                        return Some(event);
                    }
                }
                Err(e) => {
                    warn!("Stopped reading partition early: {}", e);
                    self.reader = None;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
