//! Payment Daybook - local point-of-sale payment ledger.
//!
//! The core is the payment data model (`model`), the append-only SQLite
//! record store (`db`) and the end-of-day aggregator (`summary`). The
//! `commands` module exposes them to a presentation layer as named handlers
//! that take and return JSON; `run()` serves those handlers over
//! stdin/stdout, one JSON request per line.

use std::io::{BufRead, Write};

use serde::Deserialize;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod summary;

pub use catalog::ItemCatalog;
pub use config::AppConfig;
pub use db::RecordStore;
pub use error::{
    DaybookError, InconsistentRecordError, StorageError, SummaryError, ValidationError,
};
pub use model::{
    InvoiceStatus, LineItem, LineItemDraft, PaymentDraft, PaymentRecord, PaymentType, RecordId,
};
pub use summary::{summarize, Summary};

/// One line of input to the command loop.
#[derive(Debug, Deserialize)]
struct CommandRequest {
    cmd: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

fn handle_line(store: &RecordStore, line: &str) -> serde_json::Value {
    let request: CommandRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return serde_json::json!({ "ok": false, "error": format!("Invalid request: {e}") })
        }
    };
    match commands::dispatch(store, &request.cmd, request.payload) {
        Ok(data) => serde_json::json!({ "ok": true, "data": data }),
        Err(e) => serde_json::json!({ "ok": false, "error": e }),
    }
}

/// Answer each non-blank request line from `input` with one line on `output`.
pub fn serve<R: BufRead, W: Write>(
    store: &RecordStore,
    input: R,
    mut output: W,
) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(store, &line);
        writeln!(output, "{response}")?;
        output.flush()?;
    }
    Ok(())
}

/// Install console (stderr) and daily rolling file logging.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    let env_filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    diagnostics::prune_old_logs(&log_dir, diagnostics::MAX_LOG_FILES);

    let file_appender = tracing_appender::rolling::daily(&log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    // stdout carries command responses
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Process entry point: configure logging, open the store, serve commands.
pub fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let _guard = init_logging(&config)?;

    info!("Starting Payment Daybook v{}", env!("CARGO_PKG_VERSION"));

    let store = RecordStore::open(&config.db_path())?;
    store.initialize()?;

    let catalog = ItemCatalog::load(&store)?;
    info!(
        db = %store.path().display(),
        payments = store.count()?,
        catalog_items = catalog.len(),
        "Daybook ready"
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(e) = serve(&store, stdin.lock(), stdout.lock()) {
        error!("Command loop stopped: {e}");
        return Err(e.into());
    }

    info!("Input closed, shutting down");
    Ok(())
}
