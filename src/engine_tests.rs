//! Tests for the monitor loop.

use super::*;
use crate::error::MonitorError;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tempfile::TempDir;

/// Replays queued results per address; an empty queue means reachable.
#[derive(Default)]
struct ScriptedProber {
    script: Mutex<HashMap<String, VecDeque<ProbeResult>>>,
}

impl ScriptedProber {
    fn push(&self, address: &str, results: Vec<ProbeResult>) {
        self.script
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .extend(results);
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, endpoint: &Endpoint, _timeout: Duration) -> ProbeResult {
        self.script
            .lock()
            .unwrap()
            .get_mut(&endpoint.address)
            .and_then(|q| q.pop_front())
            .unwrap_or(ProbeResult::Reachable { latency_ms: 1.25 })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        if self.fail {
            Err(MonitorError::Notifier("chat unavailable".into()))
        } else {
            Ok(())
        }
    }
}

/// Accepts the alert and never completes.
struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn send(&self, _destination: &str, _text: &str) -> Result<()> {
        std::future::pending::<Result<()>>().await
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        tick_interval: Duration::from_secs(3600),
        probe_timeout: Duration::from_secs(2),
        notify_timeout: Duration::from_secs(2),
        max_concurrency: 4,
        admin_destination: "admin".into(),
    }
}

struct Harness {
    _dir: TempDir,
    log: EventLog,
    prober: Arc<ScriptedProber>,
    notifier: Arc<RecordingNotifier>,
    monitor: Monitor,
}

fn harness_with(notifier: RecordingNotifier) -> Harness {
    let dir = TempDir::new().unwrap();
    let log = EventLog::open(dir.path().join("logs")).unwrap();
    let prober = Arc::new(ScriptedProber::default());
    let notifier = Arc::new(notifier);
    let endpoints = vec![
        Endpoint::new("gateway", "10.0.0.1"),
        Endpoint::new("db", "10.0.0.2"),
    ];
    let monitor = Monitor::new(
        endpoints,
        settings(),
        prober.clone(),
        log.clone(),
        RetentionSweeper::new(log.clone(), 7),
        notifier.clone(),
    );
    Harness { _dir: dir, log, prober, notifier, monitor }
}

fn harness() -> Harness {
    harness_with(RecordingNotifier::default())
}

fn around_today() -> (NaiveDate, NaiveDate) {
    let today = Local::now().date_naive();
    (
        today.checked_sub_days(Days::new(1)).unwrap(),
        today.checked_add_days(Days::new(1)).unwrap(),
    )
}

fn events(log: &EventLog) -> Vec<LogEvent> {
    let (start, end) = around_today();
    log.scan(start, end).collect()
}

fn count(log: &EventLog, level: Level) -> usize {
    events(log).iter().filter(|e| e.level == level).count()
}

#[tokio::test]
async fn test_first_unreachable_alerts_once() {
    let h = harness();
    h.prober.push("10.0.0.2", vec![ProbeResult::Unreachable]);

    let summary = h.monitor.run_round().await;
    assert_eq!(summary.probed, 2);
    assert_eq!(summary.transitions, 1);
    assert_eq!(summary.alerts_sent, 1);

    assert_eq!(count(&h.log, Level::Warning), 1);
    assert_eq!(h.notifier.texts(), vec!["❌ db (10.0.0.2) is unreachable."]);
    assert_eq!(h.notifier.sent.lock().unwrap()[0].0, "admin");
}

#[tokio::test]
async fn test_down_down_up_logs_each_transition_once() {
    let h = harness();
    h.prober.push(
        "10.0.0.2",
        vec![
            ProbeResult::Unreachable,
            ProbeResult::Unreachable,
            ProbeResult::Reachable { latency_ms: 7.5 },
        ],
    );

    for _ in 0..3 {
        h.monitor.run_round().await;
    }

    let db_events: Vec<_> = events(&h.log)
        .into_iter()
        .filter(|e| e.message.starts_with("db "))
        .collect();
    let levels: Vec<_> = db_events.iter().map(|e| e.level).collect();
    // The second unreachable tick writes nothing.
    assert_eq!(levels, vec![Level::Warning, Level::Info]);
    assert_eq!(db_events[1].message, "db (10.0.0.2) is back online. Latency: 7.5 ms");

    assert_eq!(
        h.notifier.texts(),
        vec![
            "❌ db (10.0.0.2) is unreachable.",
            "✅ db (10.0.0.2) is back online. Latency: 7.5 ms",
        ]
    );
}

#[tokio::test]
async fn test_repeated_unreachable_sends_single_alert() {
    let h = harness();
    h.prober.push("10.0.0.1", vec![ProbeResult::Unreachable; 5]);

    for _ in 0..5 {
        h.monitor.run_round().await;
    }

    assert_eq!(h.notifier.texts().len(), 1);
    assert_eq!(count(&h.log, Level::Warning), 1);
    assert_eq!(h.monitor.tracker().is_reachable("10.0.0.1").await, Some(false));
}

#[tokio::test]
async fn test_steady_reachable_logs_info_each_tick() {
    let h = harness();
    h.monitor.run_round().await;
    h.monitor.run_round().await;

    assert_eq!(count(&h.log, Level::Info), 4);
    assert!(h.notifier.texts().is_empty());
    assert!(events(&h.log)
        .iter()
        .all(|e| e.message.ends_with("is online. Latency: 1.25 ms")));
}

#[tokio::test]
async fn test_probe_error_always_logged_alerts_once() {
    let h = harness();
    let err = ProbeResult::ProbeError { message: "DNS resolution failed".into() };
    h.prober.push("10.0.0.1", vec![err.clone(), err]);

    h.monitor.run_round().await;
    h.monitor.run_round().await;

    assert_eq!(count(&h.log, Level::Error), 2);
    assert_eq!(count(&h.log, Level::Warning), 0);
    assert_eq!(
        h.notifier.texts(),
        vec!["❌ gateway (10.0.0.1) is unreachable: DNS resolution failed"]
    );
}

#[tokio::test]
async fn test_notifier_failure_does_not_abort_round() {
    let h = harness_with(RecordingNotifier::failing());
    h.prober.push("10.0.0.1", vec![ProbeResult::Unreachable]);
    h.prober.push("10.0.0.2", vec![ProbeResult::Unreachable]);

    let summary = h.monitor.run_round().await;
    assert_eq!(summary.transitions, 2);
    assert_eq!(summary.alerts_sent, 0);
    assert_eq!(h.notifier.texts().len(), 2);
    assert_eq!(count(&h.log, Level::Warning), 2);

    // Both stay down: no retry for the same transition.
    h.prober.push("10.0.0.1", vec![ProbeResult::Unreachable]);
    h.prober.push("10.0.0.2", vec![ProbeResult::Unreachable]);
    h.monitor.run_round().await;
    assert_eq!(h.notifier.texts().len(), 2);
}

#[tokio::test]
async fn test_log_write_failure_is_isolated() {
    let h = harness();
    let dir = h.log.dir().to_path_buf();
    std::fs::remove_dir_all(&dir).unwrap();
    std::fs::write(&dir, "not a directory").unwrap();
    h.prober.push("10.0.0.1", vec![ProbeResult::Unreachable]);

    let summary = h.monitor.run_round().await;
    assert_eq!(summary.probed, 2);
    assert_eq!(summary.failures, 2);
    assert_eq!(summary.transitions, 1);
    assert_eq!(h.notifier.texts().len(), 1);
}

#[tokio::test]
async fn test_round_sweeps_expired_partitions() {
    let h = harness();
    let old = Local::now()
        .date_naive()
        .checked_sub_days(Days::new(30))
        .unwrap();
    std::fs::write(h.log.partition_path(old), "").unwrap();

    h.monitor.run_round().await;
    assert!(!h.log.partition_path(old).exists());
}

#[tokio::test]
async fn test_shutdown_stops_run_forever() {
    let h = harness();
    let handle = h.monitor.shutdown_handle();
    let monitor = Arc::new(h.monitor);
    let runner = Arc::clone(&monitor);
    let task = tokio::spawn(async move { runner.run_forever().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown();

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("run_forever did not stop")
        .unwrap();
    assert!(count(&h.log, Level::Info) >= 2);
}

#[tokio::test]
async fn test_shutdown_before_start_skips_rounds() {
    let h = harness();
    h.monitor.shutdown_handle().shutdown();
    h.monitor.run_forever().await;
    assert!(events(&h.log).is_empty());
}

#[tokio::test]
async fn test_hanging_notifier_bounded_by_notify_timeout() {
    let dir = TempDir::new().unwrap();
    let log = EventLog::open(dir.path().join("logs")).unwrap();
    let prober = Arc::new(ScriptedProber::default());
    prober.push("10.0.0.1", vec![ProbeResult::Unreachable]);
    let settings = EngineSettings {
        notify_timeout: Duration::from_millis(100),
        ..settings()
    };
    let monitor = Monitor::new(
        vec![Endpoint::new("gateway", "10.0.0.1")],
        settings,
        prober,
        log.clone(),
        RetentionSweeper::new(log.clone(), 7),
        Arc::new(HangingNotifier),
    );

    let summary = tokio::time::timeout(Duration::from_secs(5), monitor.run_round())
        .await
        .expect("round blocked on the notifier");
    assert_eq!(summary.transitions, 1);
    assert_eq!(summary.alerts_sent, 0);
    assert_eq!(count(&log, Level::Warning), 1);
}

#[tokio::test]
async fn test_round_runs_on_spawned_task() {
    let h = harness();
    h.prober.push("10.0.0.2", vec![ProbeResult::Unreachable]);
    let monitor = Arc::new(h.monitor);
    let runner = Arc::clone(&monitor);

    let summary = tokio::spawn(async move { runner.run_round().await })
        .await
        .unwrap();
    assert_eq!(summary.probed, 2);
    assert_eq!(summary.transitions, 1);
    assert_eq!(h.notifier.texts(), vec!["❌ db (10.0.0.2) is unreachable."]);
}
