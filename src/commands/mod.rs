//! Command handlers for the presentation layer.
//!
//! Each handler takes an optional JSON payload and returns a JSON value or
//! an error string. Command names are snake_case, grouped by prefix.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::db::RecordStore;
use crate::diagnostics;
use crate::error::ValidationError;

pub mod catalog;
pub mod payments;
pub mod summary;

/// Route a named command to its handler.
pub fn dispatch(store: &RecordStore, cmd: &str, payload: Option<Value>) -> Result<Value, String> {
    debug!(cmd, "Dispatching command");
    let result = match cmd {
        "payment_add" => payments::payment_add(store, payload),
        "payment_list" => payments::payment_list(store, payload),
        "summary_generate" => summary::summary_generate(store, payload),
        "catalog_get" => catalog::catalog_get(store),
        "catalog_set" => catalog::catalog_set(store, payload),
        "catalog_reset" => catalog::catalog_reset(store),
        "app_about" => Ok(diagnostics::get_about_info()),
        other => Err(format!("Unknown command: {other}")),
    };
    if let Err(e) = &result {
        warn!(cmd, error = %e, "Command failed");
    }
    result
}

/// Parse an optional `YYYY-MM-DD` string.
pub(crate) fn parse_day(raw: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ValidationError::InvalidDate(s.to_string())),
    }
}
