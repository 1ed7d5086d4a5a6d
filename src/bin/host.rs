//! Headless scheduler host.
//!
//! Opens the task store under the platform data directory, seeds the Inbox
//! on first run, starts the scheduling supervisor with a console notifier
//! (no position sensor on a headless host), and waits for ctrl-c.

use std::sync::Arc;

use minitodo::geo::UnavailableGeo;
use minitodo::notify::ConsoleNotifier;
use minitodo::store::TaskStore;
use minitodo::{CoreConfig, SchedulerSupervisor, SqliteTaskStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("minitodo-host starting");

    let config = match CoreConfig::default_path() {
        Some(path) => CoreConfig::load_or_default(&path)
            .map_err(|e| anyhow::anyhow!("cannot load config: {e}"))?,
        None => CoreConfig::default(),
    };

    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("no platform data directory"))?
        .join("minitodo");
    let store =
        SqliteTaskStore::new(&data_dir).map_err(|e| anyhow::anyhow!("cannot open store: {e}"))?;
    store
        .ensure_seed()
        .map_err(|e| anyhow::anyhow!("cannot seed store: {e}"))?;
    tracing::info!(path = %data_dir.display(), "task store ready");

    let store: Arc<dyn TaskStore> = Arc::new(store);
    let supervisor = SchedulerSupervisor::new(
        store,
        Arc::new(ConsoleNotifier),
        Arc::new(UnavailableGeo),
        config,
    );
    let summary = supervisor.start();
    tracing::info!(
        due = summary.due_scheduler,
        location = summary.location_scheduler,
        "schedulers running, press ctrl-c to exit"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("minitodo-host shut down");
    Ok(())
}
