use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

mod api;
mod checker;
mod config;
mod engine;
mod models;
mod notify;
mod registry;
mod state;

use crate::api::AppState;
use crate::checker::NetProber;
use crate::config::MonitorConfig;
use crate::engine::Engine;
use crate::notify::Notifier;
use crate::registry::{FileStore, Registry};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_ansi(true)
        .init();

    let config = MonitorConfig::load("config.json").unwrap_or_else(|e| {
        warn!("{e:#}; starting with defaults");
        MonitorConfig::default()
    });

    let registry = Registry::new(FileStore::new(&config.store_path));
    let targets = registry.load();
    info!("Loaded {} target(s) from {}", targets.len(), config.store_path);

    let prober = NetProber::new(Duration::from_millis(config.probe_timeout_ms))?;
    let engine = Arc::new(Engine::new(prober, targets, config.max_concurrency));
    let registry = Arc::new(Mutex::new(registry));

    let app_state = AppState {
        engine: Arc::clone(&engine),
        registry: Arc::clone(&registry),
    };
    let api_port = config.api_port;
    tokio::spawn(async move {
        api::start_server(api_port, app_state).await;
    });

    let notifier = Notifier::new(config.webhook_url.clone());
    let interval = config.check_interval;
    tokio::spawn(async move {
        run_polling_loop(engine, registry, notifier, interval).await;
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping monitor");
    Ok(())
}

/// Drives the engine on a fixed interval. Passes are serialized: a pass that
/// outlives its interval skips ticks instead of racing the state tracker.
/// The registry is re-read at the start of every pass so administrative edits
/// take effect without a restart.
async fn run_polling_loop(
    engine: Arc<Engine<NetProber>>,
    registry: Arc<Mutex<Registry<FileStore>>>,
    notifier: Notifier,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let targets = registry.lock().await.load();
        engine.update_servers(targets).await;

        let alerts = engine.get_alerts().await;
        for alert in &alerts {
            if alert.current {
                warn!("{}", alert.message);
            } else {
                error!("{}", alert.message);
            }
            notifier.dispatch(alert);
        }
    }
}
