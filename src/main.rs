//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here; daily reset and retention are delegated to the repository.

use dotenv::dotenv;
use rehab_guide::adapters::clock::SystemClock;
use rehab_guide::adapters::notifications::LogNotifier;
use rehab_guide::adapters::persistence::SqliteStore;
use rehab_guide::adapters::ui::TuiInputPort;
use rehab_guide::ports::{Clock, ExerciseStore, InputPort, NotifierPort};
use rehab_guide::shared::config::AppConfig;
use rehab_guide::usecases::{ExerciseController, ExerciseRepository, ReminderService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "config unreadable, using defaults");
            AppConfig::default()
        }
    };

    let data_path = cfg.data_dir_or_default();
    let media_dir = cfg.media_dir_or_default();
    let day_boundary = cfg.day_boundary_or_default();
    info!(
        data = %data_path.display(),
        media = %media_dir.display(),
        ?day_boundary,
        "directories"
    );
    tokio::fs::create_dir_all(&media_dir)
        .await
        .map_err(|e| anyhow::anyhow!("create media dir: {}", e))?;

    // --- Storage ---
    let store: Arc<dyn ExerciseStore> = Arc::new(
        SqliteStore::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repo = Arc::new(ExerciseRepository::new(
        store,
        Arc::clone(&clock),
        day_boundary,
    ));

    // --- Launch housekeeping: yesterday's completions, expired history ---
    let reset = repo.reset_daily_progress().await?;
    let purged = repo
        .delete_old_progress(cfg.retention_days_or_default())
        .await?;
    info!(reset, purged, "launch housekeeping done");

    let controller = Arc::new(ExerciseController::start(Arc::clone(&repo)).await?);

    // --- Daily reminder ---
    let reminder = if cfg.reminders_enabled_or_default() {
        let at = cfg.reminder_time()?;
        let notifier: Arc<dyn NotifierPort> = Arc::new(LogNotifier::new(true));
        let service = ReminderService::new(notifier, Arc::clone(&clock), at);
        info!(at = %at, "daily reminder enabled (local time)");
        Some(tokio::spawn(async move {
            if let Err(e) = service.run_loop().await {
                warn!(error = %e, "daily reminder stopped");
            }
        }))
    } else {
        None
    };

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        Arc::clone(&controller),
        media_dir,
        cfg.playback_speed_or_default(),
    ));

    // --- Run (main menu) ---
    let outcome = input_port.run().await;

    if let Some(handle) = reminder {
        handle.abort();
    }
    drop(input_port);
    if let Ok(controller) = Arc::try_unwrap(controller) {
        controller.shutdown().await;
    }

    outcome.map_err(|e| anyhow::anyhow!("{}", e))
}
