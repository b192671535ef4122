use chrono::Local;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{MonitorError, Result};
use crate::event_log::EventLog;
use crate::models::{Endpoint, Level, LogEvent, ProbeResult, Transition};
use crate::notifier::Notifier;
use crate::prober::Prober;
use crate::retention::RetentionSweeper;
use crate::tracker::StatusTracker;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub probe_timeout: Duration,
    pub notify_timeout: Duration,
    pub max_concurrency: usize,
    /// Where transition alerts go, e.g. the admin chat id.
    pub admin_destination: String,
}

/// Stops [`Monitor::run_forever`] after the round in progress.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// What one round did, mostly for logging and tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoundSummary {
    pub probed: usize,
    pub transitions: usize,
    pub alerts_sent: usize,
    pub failures: usize,
}

pub struct Monitor {
    endpoints: Vec<Endpoint>,
    settings: EngineSettings,
    prober: Arc<dyn Prober>,
    tracker: Arc<StatusTracker>,
    log: EventLog,
    sweeper: RetentionSweeper,
    notifier: Arc<dyn Notifier>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Monitor {
    pub fn new(
        endpoints: Vec<Endpoint>,
        settings: EngineSettings,
        prober: Arc<dyn Prober>,
        log: EventLog,
        sweeper: RetentionSweeper,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let tracker = Arc::new(StatusTracker::new(&endpoints));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            endpoints,
            settings,
            prober,
            tracker,
            log,
            sweeper,
            notifier,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Read-only access for status queries.
    pub fn tracker(&self) -> Arc<StatusTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Runs rounds until shut down. Each round starts `tick_interval` after the
    /// previous one started, or immediately if the previous round overran.
    pub async fn run_forever(&self) {
        info!(
            "Monitoring {} endpoints every {}s",
            self.endpoints.len(),
            self.settings.tick_interval.as_secs()
        );
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }
            let start_time = Instant::now();
            let summary = self.run_round().await;
            info!(
                "Round completed {} probes in {:.2}s ({} transitions, {} failures)",
                summary.probed,
                start_time.elapsed().as_secs_f64(),
                summary.transitions,
                summary.failures
            );

            tokio::select! {
                _ = tokio::time::sleep_until(start_time + self.settings.tick_interval) => {}
                _ = shutdown_rx.changed() => {}
            }
        }
        info!("Monitor loop stopped");
    }

    /// One pass over every endpoint followed by a retention sweep.
    pub async fn run_round(&self) -> RoundSummary {
        let timeout = self.settings.probe_timeout;
        let probes: Vec<_> = self
            .endpoints
            .iter()
            .map(|endpoint| self.prober.probe(endpoint, timeout))
            .collect();
        let results: Vec<ProbeResult> = stream::iter(probes)
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let mut summary = RoundSummary::default();
        for (endpoint, result) in self.endpoints.iter().zip(results) {
            summary.probed += 1;
            let outcome = self.process_result(endpoint, &result).await;
            summary.transitions += usize::from(outcome.transition.is_some());
            summary.alerts_sent += usize::from(outcome.alert_sent);
            if let Err(e) = outcome.logged {
                summary.failures += 1;
                error!("Failed to record result for {}: {}", endpoint.label(), e);
            }
        }

        let sweeper = self.sweeper.clone();
        let swept =
            tokio::task::spawn_blocking(move || sweeper.sweep(Local::now().date_naive())).await;
        match swept {
            Ok(Ok(removed)) if !removed.is_empty() => {
                info!("Retention sweep removed {} partitions", removed.len())
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Retention sweep failed: {}", e),
            Err(e) => error!("Retention sweep task failed: {}", e),
        }
        summary
    }

    async fn process_result(&self, endpoint: &Endpoint, result: &ProbeResult) -> Outcome {
        let transition = self.tracker.observe(&endpoint.address, result).await;
        let label = endpoint.label();

        let (event, alert) = match (result, transition) {
            (ProbeResult::ProbeError { message }, _) => (
                Some(LogEvent::now(Level::Error, format!("Ping error {}: {}", label, message))),
                transition.map(|_| format!("❌ {} is unreachable: {}", label, message)),
            ),
            (_, Some(Transition::WentDown)) => (
                Some(LogEvent::now(Level::Warning, format!("{} is unreachable.", label))),
                Some(format!("❌ {} is unreachable.", label)),
            ),
            (ProbeResult::Reachable { latency_ms }, Some(Transition::WentUp)) => {
                let text = format!("{} is back online. Latency: {} ms", label, latency_ms);
                (Some(LogEvent::now(Level::Info, text.clone())), Some(format!("✅ {}", text)))
            }
            (ProbeResult::Reachable { latency_ms }, None) => (
                Some(LogEvent::now(
                    Level::Info,
                    format!("{} is online. Latency: {} ms", label, latency_ms),
                )),
                None,
            ),
            // Still down: already alerted once.
            _ => (None, None),
        };

        match transition {
            Some(Transition::WentDown) => error!("[CHANGE] {} -> Down", label),
            Some(Transition::WentUp) => warn!("[CHANGE] {} -> Up", label),
            None => debug!("{} unchanged: {:?}", label, result),
        }

        // The alert goes out even if the write failed.
        let logged = match event {
            Some(event) => self.record(event).await,
            None => Ok(()),
        };
        let alert_sent = match alert {
            Some(text) => self.notify(&text).await,
            None => false,
        };
        Outcome { transition, alert_sent, logged }
    }

    /// Partition writes are blocking file I/O, so they run off the async workers.
    async fn record(&self, event: LogEvent) -> Result<()> {
        let log = self.log.clone();
        let dir = log.dir().to_path_buf();
        tokio::task::spawn_blocking(move || log.record(&event))
            .await
            .unwrap_or_else(|e| {
                Err(MonitorError::LogWrite {
                    path: dir,
                    source: std::io::Error::other(e),
                })
            })
    }

    /// Delivery failures are logged and never retried for the same transition.
    async fn notify(&self, text: &str) -> bool {
        let destination = &self.settings.admin_destination;
        let send = self.notifier.send(destination, text);
        match tokio::time::timeout(self.settings.notify_timeout, send).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("{} notifier failed: {}", self.notifier.name(), e);
                false
            }
            Err(_) => {
                error!("{} notifier timed out", self.notifier.name());
                false
            }
        }
    }
}

struct Outcome {
    transition: Option<Transition>,
    alert_sent: bool,
    logged: Result<()>,
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
