//! End-of-day summary of recorded payments.
//!
//! `summarize` is a pure function over a slice of records; `generate` reads
//! the records for a day (or all of them) from the store first. A record
//! whose declared total disagrees with its line items fails the whole
//! summary.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::RecordStore;
use crate::error::{DaybookError, SummaryError};
use crate::model::{cents, InvoiceStatus, PaymentRecord, PaymentType, RecordId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub record_count: usize,
    pub grand_total: Decimal,
    pub total_by_payment_type: BTreeMap<PaymentType, Decimal>,
    pub count_by_payment_type: BTreeMap<PaymentType, usize>,
    pub total_by_invoiced: BTreeMap<InvoiceStatus, Decimal>,
    /// Per-item totals in first-seen order. Empty unless grouped by item.
    pub total_by_item_name: IndexMap<String, Decimal>,
    pub grouped_by_item: bool,
}

/// Aggregate `records` into a summary.
///
/// Fails on the first record whose declared total disagrees with its line
/// items, or whose amounts push a running total past `Decimal::MAX`.
pub fn summarize(records: &[PaymentRecord], group_by_item: bool) -> Result<Summary, SummaryError> {
    let mut summary = Summary {
        grouped_by_item: group_by_item,
        ..Summary::default()
    };

    for record in records {
        add_record(&mut summary, record).map_err(|e| {
            warn!(record_id = ?record.id, "Cannot aggregate payment record: {e}");
            e
        })?;
    }

    Ok(summary)
}

fn add_record(summary: &mut Summary, record: &PaymentRecord) -> Result<(), SummaryError> {
    let total = record.check_consistency()?;
    let id = record.id;

    accumulate(&mut summary.grand_total, total, id)?;
    accumulate(
        summary
            .total_by_payment_type
            .entry(record.payment_type)
            .or_default(),
        total,
        id,
    )?;
    accumulate(
        summary
            .total_by_invoiced
            .entry(record.invoice_status())
            .or_default(),
        total,
        id,
    )?;

    if summary.grouped_by_item {
        for li in &record.line_items {
            accumulate(
                summary
                    .total_by_item_name
                    .entry(li.item_name.clone())
                    .or_default(),
                li.amount,
                id,
            )?;
        }
    }

    summary.record_count += 1;
    *summary
        .count_by_payment_type
        .entry(record.payment_type)
        .or_default() += 1;
    Ok(())
}

fn accumulate(slot: &mut Decimal, amount: Decimal, id: Option<RecordId>) -> Result<(), SummaryError> {
    *slot = slot
        .checked_add(amount)
        .ok_or(SummaryError::Overflow { id })?;
    Ok(())
}

/// Read records from the store and summarize them.
///
/// With `day = Some(..)` only that UTC day's payments are included;
/// otherwise every stored payment is.
pub fn generate(
    store: &RecordStore,
    day: Option<NaiveDate>,
    group_by_item: bool,
) -> Result<Summary, DaybookError> {
    let records = match day {
        Some(day) => store.list_for_day(day)?,
        None => store.list_all()?,
    };

    info!(
        day = ?day,
        records = records.len(),
        group_by_item,
        "Generating daily summary"
    );

    let summary = summarize(&records, group_by_item)?;
    info!(grand_total = %summary.grand_total, "Daily summary generated");
    Ok(summary)
}

impl Summary {
    /// Plain-text report for display or printing.
    pub fn render_text(&self, heading: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{heading}");
        let _ = writeln!(out, "{}", "=".repeat(heading.chars().count().max(16)));
        let _ = writeln!(out, "Payments: {}", self.record_count);
        let _ = writeln!(out, "Grand total: {:.2}", cents(self.grand_total));

        if !self.total_by_payment_type.is_empty() {
            let _ = writeln!(out, "\nBy payment type:");
            for (payment_type, total) in &self.total_by_payment_type {
                let count = self
                    .count_by_payment_type
                    .get(payment_type)
                    .copied()
                    .unwrap_or(0);
                let _ = writeln!(out, "  {}: {:.2} ({count})", payment_type.label(), cents(*total));
            }
        }

        if !self.total_by_invoiced.is_empty() {
            let _ = writeln!(out, "\nBy invoicing:");
            for (status, total) in &self.total_by_invoiced {
                let _ = writeln!(out, "  {}: {:.2}", status.label(), cents(*total));
            }
        }

        if self.grouped_by_item && !self.total_by_item_name.is_empty() {
            let _ = writeln!(out, "\nBy item:");
            for (item_name, total) in &self.total_by_item_name {
                let _ = writeln!(out, "  {item_name}: {:.2}", cents(*total));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineItem;
    use chrono::{TimeZone, Utc};

    fn dec(s: &str) -> Decimal {
        s.parse().expect("decimal literal")
    }

    fn record(items: &[(&str, &str)], payment_type: PaymentType, invoiced: bool) -> PaymentRecord {
        let line_items = items
            .iter()
            .map(|(name, amount)| LineItem::new(*name, dec(amount), Some("N/A")))
            .collect();
        PaymentRecord::new(
            None,
            None,
            line_items,
            payment_type,
            invoiced,
            Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap(),
        )
        .expect("build record")
    }

    #[test]
    fn test_empty_input_yields_zero_summary() {
        let summary = summarize(&[], true).expect("empty summary");
        assert_eq!(summary.record_count, 0);
        assert_eq!(summary.grand_total, Decimal::ZERO);
        assert!(summary.total_by_payment_type.is_empty());
        assert!(summary.total_by_invoiced.is_empty());
        assert!(summary.total_by_item_name.is_empty());
        assert!(summary.grouped_by_item);
    }

    #[test]
    fn test_payment_type_and_invoiced_breakdown() {
        let records = vec![
            record(&[("PC", "50.00")], PaymentType::Cash, false),
            record(&[("Scan", "30.00")], PaymentType::Banca, true),
        ];
        let summary = summarize(&records, false).unwrap();

        assert_eq!(summary.grand_total, dec("80.00"));
        assert_eq!(summary.total_by_payment_type[&PaymentType::Cash], dec("50.00"));
        assert_eq!(summary.total_by_payment_type[&PaymentType::Banca], dec("30.00"));
        assert_eq!(summary.total_by_invoiced[&InvoiceStatus::NotInvoiced], dec("50.00"));
        assert_eq!(summary.total_by_invoiced[&InvoiceStatus::Invoiced], dec("30.00"));
        assert!(summary.total_by_item_name.is_empty());
    }

    #[test]
    fn test_breakdowns_sum_to_grand_total() {
        let records = vec![
            record(&[("PC", "12.10"), ("Acce", "0.90")], PaymentType::Cash, true),
            record(&[("Cop", "0.25")], PaymentType::Cash, false),
            record(&[("Netflix", "9.99")], PaymentType::Banca, false),
            record(&[("Office", "45"), ("Var", "1.01")], PaymentType::Banca, true),
        ];
        let summary = summarize(&records, false).unwrap();

        let by_type: Decimal = summary.total_by_payment_type.values().copied().sum();
        let by_invoiced: Decimal = summary.total_by_invoiced.values().copied().sum();
        assert_eq!(summary.grand_total, dec("69.25"));
        assert_eq!(by_type, summary.grand_total);
        assert_eq!(by_invoiced, summary.grand_total);
        assert_eq!(summary.count_by_payment_type[&PaymentType::Cash], 2);
        assert_eq!(summary.count_by_payment_type[&PaymentType::Banca], 2);
        assert_eq!(summary.record_count, 4);
    }

    #[test]
    fn test_group_by_item_in_first_seen_order() {
        let records = vec![
            record(&[("PC", "20.00"), ("Acce", "5.00")], PaymentType::Cash, false),
            record(&[("PC", "10.00")], PaymentType::Cash, false),
        ];
        let summary = summarize(&records, true).unwrap();

        let items: Vec<(&str, Decimal)> = summary
            .total_by_item_name
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(items, vec![("PC", dec("30.00")), ("Acce", dec("5.00"))]);
    }

    #[test]
    fn test_inconsistent_record_fails_fast() {
        let mut bad = record(&[("PC", "10")], PaymentType::Cash, false);
        bad.total = dec("15");
        let records = vec![record(&[("Cop", "1")], PaymentType::Cash, false), bad];

        match summarize(&records, true).unwrap_err() {
            SummaryError::Inconsistent(err) => {
                assert_eq!(err.declared, dec("15"));
                assert_eq!(err.computed, dec("10"));
                assert_eq!(err.id, None);
            }
            other => panic!("expected inconsistent record, got {other:?}"),
        }
    }

    #[test]
    fn test_grand_total_overflow_is_an_error() {
        let mut second = record(&[("PC", "50000000000000000000000000000")], PaymentType::Banca, true);
        second.id = Some(RecordId(2));
        let records = vec![
            record(&[("PC", "50000000000000000000000000000")], PaymentType::Cash, false),
            second,
        ];

        let err = summarize(&records, false).unwrap_err();
        assert_eq!(err, SummaryError::Overflow { id: Some(RecordId(2)) });
        assert_eq!(err.to_string(), "totals overflowed while adding record 2");
    }

    #[test]
    fn test_generate_reads_from_store() {
        let store = RecordStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
            .append(&record(&[("PC", "20.00"), ("Acce", "5.00")], PaymentType::Cash, false))
            .unwrap();
        store
            .append(&record(&[("PC", "10.00")], PaymentType::Banca, true))
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let summary = generate(&store, Some(day), true).unwrap();
        assert_eq!(summary.grand_total, dec("35.00"));
        assert_eq!(summary.total_by_item_name["PC"], dec("30.00"));

        let other_day = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let empty = generate(&store, Some(other_day), true).unwrap();
        assert_eq!(empty.record_count, 0);

        let all = generate(&store, None, false).unwrap();
        assert_eq!(all.record_count, 2);
    }

    #[test]
    fn test_render_text() {
        let records = vec![
            record(&[("PC", "20"), ("Acce", "5")], PaymentType::Cash, false),
            record(&[("PC", "10")], PaymentType::Banca, true),
        ];
        let text = summarize(&records, true).unwrap().render_text("Daily Summary 2026-10-19");

        assert!(text.starts_with("Daily Summary 2026-10-19\n"));
        assert!(text.contains("Payments: 2\n"));
        assert!(text.contains("Grand total: 35.00\n"));
        assert!(text.contains("  Cash: 25.00 (1)\n"));
        assert!(text.contains("  Banca: 10.00 (1)\n"));
        assert!(text.contains("  Invoiced: 10.00\n"));
        assert!(text.contains("  Not invoiced: 25.00\n"));
        assert!(text.contains("By item:\n  PC: 30.00\n  Acce: 5.00\n"));
    }

    #[test]
    fn test_render_text_rounds_half_away_from_zero() {
        let records = vec![
            record(&[("Cop", "5.555")], PaymentType::Cash, false),
            record(&[("Imp", "0.125")], PaymentType::Banca, true),
        ];
        let text = summarize(&records, true).unwrap().render_text("Summary");

        assert!(text.contains("Grand total: 5.68\n"));
        assert!(text.contains("  Cash: 5.56 (1)\n"));
        assert!(text.contains("  Banca: 0.13 (1)\n"));
        assert!(text.contains("  Not invoiced: 5.56\n"));
        assert!(text.contains("  Cop: 5.56\n"));
        assert!(text.contains("  Imp: 0.13\n"));
    }

    #[test]
    fn test_render_text_ungrouped_has_no_item_section() {
        let records = vec![record(&[("PC", "20")], PaymentType::Cash, false)];
        let text = summarize(&records, false).unwrap().render_text("Summary");
        assert!(!text.contains("By item:"));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let records = vec![record(&[("PC", "20.00")], PaymentType::Banca, true)];
        let json = serde_json::to_value(summarize(&records, true).unwrap()).unwrap();
        assert_eq!(json["grandTotal"], "20.00");
        assert_eq!(json["totalByPaymentType"]["banca"], "20.00");
        assert_eq!(json["totalByInvoiced"]["invoiced"], "20.00");
        assert_eq!(json["totalByItemName"]["PC"], "20.00");
        assert_eq!(json["groupedByItem"], true);
    }
}
