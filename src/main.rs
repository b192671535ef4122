use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use netpulse::api;
use netpulse::commands::CommandHandler;
use netpulse::engine::{EngineSettings, Monitor};
use netpulse::event_log::EventLog;
use netpulse::notifier;
use netpulse::prober::NetworkProber;
use netpulse::query::QueryService;
use netpulse::retention::RetentionSweeper;
use netpulse::MonitorConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".into());
    let config = MonitorConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;
    let endpoints = config.endpoints()?;

    let log = EventLog::open(&config.log_dir)
        .with_context(|| format!("Failed to prepare log directory {}", config.log_dir.display()))?;
    let sweeper = RetentionSweeper::new(log.clone(), config.retention_days);
    let prober = Arc::new(NetworkProber::new().context("Failed to create prober")?);
    let notifier = notifier::from_config(&config.notifier, config.notify_timeout())?;

    let settings = EngineSettings {
        tick_interval: config.tick_interval(),
        probe_timeout: config.probe_timeout(),
        notify_timeout: config.notify_timeout(),
        max_concurrency: config.max_concurrency,
        admin_destination: config.admin_chat_id.clone(),
    };
    let monitor = Arc::new(Monitor::new(endpoints, settings, prober, log.clone(), sweeper, notifier));
    let shutdown = monitor.shutdown_handle();

    let handler = CommandHandler::new(monitor.tracker(), QueryService::new(log));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::start_server(api_port, handler).await {
            tracing::error!("Status API failed: {}", e);
        }
    });

    let monitor_clone = Arc::clone(&monitor);
    let engine = tokio::spawn(async move { monitor_clone.run_forever().await });

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Closing NetPulse Engine...");
    shutdown.shutdown();
    engine.await?;

    Ok(())
}
