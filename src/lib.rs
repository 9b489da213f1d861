mod clock;
mod config;
mod error;
mod facade;
mod protocol;
mod reminder;
mod repository;
mod scheduler;
mod service;
mod settings;
mod storage;
mod timeparse;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, LoggingConfig};
pub use error::{AppError, AppResult};
pub use facade::NotificationFacade;
pub use protocol::{decode_line, ChangeCause, Command, Inbound, UiEvent};
pub use reminder::{Reminder, ReminderId, Selector};
pub use repository::ReminderRepository;
pub use scheduler::{ExpirationScheduler, SchedulerState};
pub use service::{dispatch, run_engine};
pub use settings::{Settings, SettingsStore};
pub use storage::{LocalStore, MemoryStore, PersistentStore};
pub use timeparse::parse_time_expression;
pub use transport::{read_commands, write_events};

use config::COMMAND_QUEUE_DEPTH;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Entry point of the `reminder-engine` binary.
///
/// Reads commands as JSON lines on stdin and writes events as JSON lines
/// on stdout until stdin closes, `SHUTDOWN` arrives or Ctrl+C.
pub fn run() -> AppResult<()> {
    let config = AppConfig::from_env()?;
    config.logging.init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "Starting reminder engine"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::config(format!("failed to start runtime: {}", e)))?;

    let result = runtime.block_on(serve(config));
    // A blocked stdin read cannot be cancelled; don't wait on it
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn serve(config: AppConfig) -> AppResult<()> {
    let store = Arc::new(LocalStore::open(config.store_path())?);
    info!(path = %store.path().display(), "Opened store");

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_events(event_rx, tokio::io::stdout()));

    let mut facade = NotificationFacade::new(store, Arc::new(SystemClock), event_tx);
    facade.initialize()?;
    if let Err(e) = facade.welcome_message() {
        warn!(error = %e, "Failed to add welcome reminder");
    }
    if let Err(e) = facade.start_watching() {
        error!(error = %e, "Initial watch failed");
    }

    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let reader = tokio::spawn(read_commands(BufReader::new(tokio::io::stdin()), command_tx));

    tokio::select! {
        _ = run_engine(facade, command_rx, config.checkpoint_interval) => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Ctrl+C received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        },
    }

    // The facade held the only event sender, so the writer drains and ends
    reader.abort();
    if let Err(e) = writer.await {
        warn!(error = %e, "Event writer task failed");
    }
    info!("Reminder engine stopped");
    Ok(())
}
