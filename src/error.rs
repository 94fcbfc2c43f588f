//! Error taxonomy for the daybook.
//!
//! Validation failures are caught before anything reaches the store,
//! storage failures abort a single operation, and inconsistent records are
//! surfaced by the aggregator.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::RecordId;

/// A submitted payment (or draft) that must not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payment has no valid line items")]
    NoLineItems,

    #[error("line item '{item_name}' has non-positive amount {amount}")]
    NonPositiveAmount { item_name: String, amount: Decimal },

    #[error("unknown item '{0}' (not in the item catalog)")]
    UnknownItem(String),

    #[error("declared total {declared} does not match line item sum {computed}")]
    TotalMismatch { declared: Decimal, computed: Decimal },

    #[error("invalid payment type: {0}. Must be cash or banca")]
    UnknownPaymentType(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("line item amounts are too large to add up")]
    AmountOverflow,
}

/// The backing medium could not be read or written.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// A stored record whose declared total disagrees with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {} declares total {declared} but its line items sum to {computed}", display_id(.id))]
pub struct InconsistentRecordError {
    pub id: Option<RecordId>,
    pub declared: Decimal,
    pub computed: Decimal,
}

fn display_id(id: &Option<RecordId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "<unsaved>".to_string(),
    }
}

/// A set of records that cannot be aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error(transparent)]
    Inconsistent(#[from] InconsistentRecordError),

    #[error("totals overflowed while adding record {}", display_id(.id))]
    Overflow { id: Option<RecordId> },
}

/// Umbrella error for operations spanning validation, storage and aggregation.
#[derive(Debug, Error)]
pub enum DaybookError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

impl From<InconsistentRecordError> for DaybookError {
    fn from(e: InconsistentRecordError) -> Self {
        DaybookError::Summary(SummaryError::Inconsistent(e))
    }
}

impl From<rusqlite::Error> for DaybookError {
    fn from(e: rusqlite::Error) -> Self {
        DaybookError::Storage(StorageError::Sqlite(e))
    }
}

pub type Result<T, E = DaybookError> = std::result::Result<T, E>;
