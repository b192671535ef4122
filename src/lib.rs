//! NetPulse: probes a fixed set of endpoints, alerts once per up/down
//! transition, and keeps a day-partitioned event log that can be queried for
//! failures over a date range.

pub mod api;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod models;
pub mod notifier;
pub mod prober;
pub mod query;
pub mod retention;
pub mod tracker;

pub use config::MonitorConfig;
pub use engine::{EngineSettings, Monitor, RoundSummary, ShutdownHandle};
pub use error::{MonitorError, Result};
pub use event_log::EventLog;
pub use models::{Endpoint, EndpointStatus, Level, LogEvent, ProbeResult, Transition};
pub use notifier::Notifier;
pub use prober::Prober;
pub use query::{FailureReport, QueryService};
pub use retention::RetentionSweeper;
pub use tracker::StatusTracker;
