//! Local SQLite record store for the payment daybook.
//!
//! Uses rusqlite with WAL mode and full synchronous commits, so every
//! appended payment is durable once `append` returns. Payments are
//! append-only: there is no update or delete path. Line items live in their
//! own table keyed by the owning payment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, ToSql, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::error::{DaybookError, StorageError};
use crate::model::{LineItem, PaymentRecord, PaymentType, RecordId};

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Owned handle to the daybook database.
///
/// Constructed once at startup and passed by reference to whatever needs
/// persistence.
pub struct RecordStore {
    conn: Connection,
    db_path: PathBuf,
}

impl RecordStore {
    /// Open (or create) the database file at `path` and apply pragmas.
    ///
    /// Creates the parent directory if needed. The schema is not touched;
    /// call [`RecordStore::initialize`] afterwards.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        info!("Opening database at {}", path.display());

        let conn = Connection::open(path).map_err(|e| {
            error!("Database open failed: {e}");
            e
        })?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = FULL;",
        )?;

        Ok(Self {
            conn,
            db_path: path.to_path_buf(),
        })
    }

    /// Open a private in-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Ensure the schema exists. Idempotent; safe on every startup.
    pub fn initialize(&self) -> Result<(), StorageError> {
        run_migrations(&self.conn)?;
        info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i32, StorageError> {
        let version = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Payments
    // -----------------------------------------------------------------------

    /// Append one payment and its line items in a single transaction.
    ///
    /// The record is validated first; invalid records are never written.
    /// Any `id` already set on `record` is ignored.
    pub fn append(&self, record: &PaymentRecord) -> Result<RecordId, DaybookError> {
        record.validate()?;

        let time_added = record.time_added.to_rfc3339_opts(SecondsFormat::AutoSi, true);

        // Dropping an uncommitted transaction rolls it back, including when
        // COMMIT itself fails.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let id = write_payment(&tx, record, &time_added)
            .and_then(|id| tx.commit().map(|()| id))
            .map_err(|e| {
                error!("Payment insert failed, rolled back: {e}");
                StorageError::from(e)
            })?;

        info!(
            payment_id = %id,
            payment_type = %record.payment_type,
            total = %record.total,
            items = record.line_items.len(),
            "Payment recorded"
        );
        Ok(id)
    }

    /// Every persisted payment in insertion order.
    pub fn list_all(&self) -> Result<Vec<PaymentRecord>, StorageError> {
        self.query_payments("", &[])
    }

    /// Payments whose `time_added` falls on `day` (UTC), in insertion order.
    pub fn list_for_day(&self, day: NaiveDate) -> Result<Vec<PaymentRecord>, StorageError> {
        let start = day.format("%Y-%m-%d").to_string();
        let end = day
            .checked_add_days(Days::new(1))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .ok_or_else(|| StorageError::Corrupt(format!("date out of range: {day}")))?;
        self.query_payments(
            "WHERE time_added >= ?1 AND time_added < ?2",
            &[&start, &end],
        )
    }

    /// Number of persisted payments.
    pub fn count(&self) -> Result<i64, StorageError> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))?;
        Ok(n)
    }

    fn query_payments(
        &self,
        filter: &str,
        args: &[&dyn ToSql],
    ) -> Result<Vec<PaymentRecord>, StorageError> {
        struct PaymentRow {
            id: i64,
            client_name: String,
            banca_name: Option<String>,
            total: String,
            payment_type: String,
            is_invoiced: bool,
            time_added: String,
        }

        let sql = format!(
            "SELECT id, client_name, banca_name, total, payment_type, is_invoiced, time_added
             FROM payments {filter}
             ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok(PaymentRow {
                    id: row.get(0)?,
                    client_name: row.get(1)?,
                    banca_name: row.get(2)?,
                    total: row.get(3)?,
                    payment_type: row.get(4)?,
                    is_invoiced: row.get(5)?,
                    time_added: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let payment_type = PaymentType::from_str(&row.payment_type).map_err(|_| {
                StorageError::Corrupt(format!(
                    "payment {}: unknown payment_type '{}'",
                    row.id, row.payment_type
                ))
            })?;
            let time_added = DateTime::parse_from_rfc3339(&row.time_added)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    StorageError::Corrupt(format!("payment {}: time_added: {e}", row.id))
                })?;
            records.push(PaymentRecord {
                id: Some(RecordId(row.id)),
                client_name: row.client_name,
                banca_name: row.banca_name,
                line_items: self.line_items_for(row.id)?,
                total: parse_decimal(&row.total, row.id, "total")?,
                payment_type,
                is_invoiced: row.is_invoiced,
                time_added,
            });
        }

        debug!(count = records.len(), "Loaded payments");
        Ok(records)
    }

    fn line_items_for(&self, payment_id: i64) -> Result<Vec<LineItem>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT item_name, amount, details
             FROM payment_line_items
             WHERE payment_id = ?1
             ORDER BY position ASC",
        )?;
        let rows = stmt
            .query_map(params![payment_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(item_name, amount, details)| {
                Ok(LineItem {
                    item_name,
                    amount: parse_decimal(&amount, payment_id, "line item amount")?,
                    details,
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Settings helpers
    // -----------------------------------------------------------------------

    /// Get a single setting value by category and key.
    pub fn get_setting(&self, category: &str, key: &str) -> Result<Option<String>, StorageError> {
        match self.conn.query_row(
            "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
            params![category, key],
            |row| row.get(0),
        ) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or update a setting.
    pub fn set_setting(&self, category: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(setting_category, setting_key) DO UPDATE SET
                setting_value = excluded.setting_value,
                updated_at = excluded.updated_at",
            params![category, key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, category: &str, key: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
            params![category, key],
        )?;
        Ok(())
    }
}

/// Insert one payment and its line items inside `tx`.
fn write_payment(
    tx: &Transaction<'_>,
    record: &PaymentRecord,
    time_added: &str,
) -> rusqlite::Result<RecordId> {
    tx.execute(
        "INSERT INTO payments (
            client_name, banca_name, total, payment_type, is_invoiced, time_added
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.client_name,
            record.banca_name,
            record.total.to_string(),
            record.payment_type.as_str(),
            record.is_invoiced,
            time_added,
        ],
    )?;
    let payment_id = tx.last_insert_rowid();

    let mut stmt = tx.prepare_cached(
        "INSERT INTO payment_line_items (payment_id, position, item_name, amount, details)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, li) in record.line_items.iter().enumerate() {
        stmt.execute(params![
            payment_id,
            position as i64,
            li.item_name,
            li.amount.to_string(),
            li.details,
        ])?;
    }

    Ok(RecordId(payment_id))
}

fn parse_decimal(raw: &str, payment_id: i64, what: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(raw).map_err(|e| {
        StorageError::Corrupt(format!("payment {payment_id}: {what} '{raw}': {e}"))
    })
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    if current >= CURRENT_SCHEMA_VERSION {
        debug!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Migration v1: payments, normalized line items, settings.
fn migrate_v1(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        BEGIN;

        -- payments (append-only)
        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_name TEXT NOT NULL DEFAULT 'unknown',
            banca_name TEXT,
            total TEXT NOT NULL,
            payment_type TEXT NOT NULL CHECK (payment_type IN ('cash', 'banca')),
            is_invoiced INTEGER NOT NULL DEFAULT 0,
            time_added TEXT NOT NULL
        );

        -- payment_line_items (one row per priced item)
        CREATE TABLE IF NOT EXISTS payment_line_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payment_id INTEGER NOT NULL REFERENCES payments(id),
            position INTEGER NOT NULL,
            item_name TEXT NOT NULL,
            amount TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT 'N/A',
            UNIQUE(payment_id, position)
        );

        -- local_settings (category/key/value store)
        CREATE TABLE IF NOT EXISTS local_settings (
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY(setting_category, setting_key)
        );

        CREATE INDEX IF NOT EXISTS idx_line_items_payment ON payment_line_items(payment_id);

        INSERT INTO schema_version (version) VALUES (1);

        COMMIT;
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        let _ = conn.execute_batch("ROLLBACK");
        e
    })?;

    info!("Applied migration v1");
    Ok(())
}

/// Migration v2: index for per-day reads.
fn migrate_v2(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_payments_time_added ON payments(time_added);
        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| {
        error!("Migration v2 failed: {e}");
        e
    })?;

    info!("Applied migration v2 (time_added index)");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
