//! Payment record data model.
//!
//! A `PaymentDraft` is the raw form state collected by the presentation
//! layer. Validating it against the item catalog yields a `PaymentRecord`,
//! which is written once to the store and never updated afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::ItemCatalog;
use crate::error::{InconsistentRecordError, SummaryError, ValidationError};

/// Client name used when the form leaves it blank.
pub const UNKNOWN_CLIENT: &str = "unknown";
/// Line item details used when the form leaves them blank.
pub const NO_DETAILS: &str = "N/A";

/// Store-assigned identifier of a persisted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[serde(alias = "Cash")]
    Cash,
    #[serde(alias = "Banca")]
    Banca,
}

impl PaymentType {
    /// Value stored in the `payments.payment_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Banca => "banca",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentType::Cash => "Cash",
            PaymentType::Banca => "Banca",
        }
    }
}

impl FromStr for PaymentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentType::Cash),
            "banca" => Ok(PaymentType::Banca),
            _ => Err(ValidationError::UnknownPaymentType(s.trim().to_string())),
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether an invoice was issued; used as a summary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Invoiced,
    NotInvoiced,
}

impl From<bool> for InvoiceStatus {
    fn from(is_invoiced: bool) -> Self {
        if is_invoiced {
            InvoiceStatus::Invoiced
        } else {
            InvoiceStatus::NotInvoiced
        }
    }
}

impl InvoiceStatus {
    pub fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Invoiced => "Invoiced",
            InvoiceStatus::NotInvoiced => "Not invoiced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub item_name: String,
    pub amount: Decimal,
    pub details: String,
}

impl LineItem {
    /// Build a line item, defaulting blank details to `N/A`.
    pub fn new(item_name: impl Into<String>, amount: Decimal, details: Option<&str>) -> Self {
        Self {
            item_name: item_name.into(),
            amount,
            details: non_blank(details).unwrap_or_else(|| NO_DETAILS.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Option<RecordId>,
    pub client_name: String,
    pub banca_name: Option<String>,
    pub line_items: Vec<LineItem>,
    pub total: Decimal,
    pub payment_type: PaymentType,
    pub is_invoiced: bool,
    pub time_added: DateTime<Utc>,
}

impl PaymentRecord {
    /// Build an unsaved record whose total is the sum of `line_items`.
    ///
    /// Blank client names become `unknown`; the banca name is only kept for
    /// Banca payments. Fails when the amounts cannot be summed.
    pub fn new(
        client_name: Option<&str>,
        banca_name: Option<&str>,
        line_items: Vec<LineItem>,
        payment_type: PaymentType,
        is_invoiced: bool,
        time_added: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let total = checked_sum(line_items.iter().map(|li| li.amount))
            .ok_or(ValidationError::AmountOverflow)?;
        let banca_name = match payment_type {
            PaymentType::Banca => non_blank(banca_name),
            PaymentType::Cash => None,
        };
        Ok(Self {
            id: None,
            client_name: non_blank(client_name).unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
            banca_name,
            line_items,
            total,
            payment_type,
            is_invoiced,
            time_added,
        })
    }

    /// Sum of the line item amounts, or `None` on overflow.
    pub fn line_item_sum(&self) -> Option<Decimal> {
        checked_sum(self.line_items.iter().map(|li| li.amount))
    }

    pub fn invoice_status(&self) -> InvoiceStatus {
        InvoiceStatus::from(self.is_invoiced)
    }

    /// Check the invariants required before a record may be persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.line_items.is_empty() {
            return Err(ValidationError::NoLineItems);
        }
        if let Some(bad) = self.line_items.iter().find(|li| li.amount <= Decimal::ZERO) {
            return Err(ValidationError::NonPositiveAmount {
                item_name: bad.item_name.clone(),
                amount: bad.amount,
            });
        }
        let computed = self
            .line_item_sum()
            .ok_or(ValidationError::AmountOverflow)?;
        if computed != self.total {
            return Err(ValidationError::TotalMismatch {
                declared: self.total,
                computed,
            });
        }
        Ok(())
    }

    /// Verify the declared total against the line items, returning the total.
    pub fn check_consistency(&self) -> Result<Decimal, SummaryError> {
        let computed = self
            .line_item_sum()
            .ok_or(SummaryError::Overflow { id: self.id })?;
        if computed != self.total {
            return Err(InconsistentRecordError {
                id: self.id,
                declared: self.total,
                computed,
            }
            .into());
        }
        Ok(self.total)
    }
}

impl fmt::Display for PaymentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Client: {}, Type: {}, Invoiced: {}, Time: {}, Total: {:.2}",
            self.client_name,
            self.payment_type,
            if self.is_invoiced { "Yes" } else { "No" },
            self.time_added.format("%Y-%m-%d %H:%M:%S"),
            cents(self.total),
        )?;
        if let (PaymentType::Banca, Some(banca)) = (self.payment_type, &self.banca_name) {
            writeln!(f, "  Paid by: {banca}")?;
        }
        for li in &self.line_items {
            writeln!(
                f,
                "  Item: {}, Amount: {:.2}, Details: {}",
                li.item_name,
                cents(li.amount),
                li.details
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Drafts (unvalidated form state)
// ---------------------------------------------------------------------------

/// One row of the payment form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDraft {
    #[serde(default, alias = "item", alias = "item_name")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "blank_amount_as_none")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub details: Option<String>,
}

/// A payment as submitted by the form, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    #[serde(default, alias = "client_name")]
    pub client_name: Option<String>,
    #[serde(default, alias = "banca_name")]
    pub banca_name: Option<String>,
    #[serde(default, alias = "lineItems", alias = "line_items")]
    pub items: Vec<LineItemDraft>,
    #[serde(alias = "payment_type")]
    pub payment_type: String,
    #[serde(default, alias = "is_invoiced")]
    pub is_invoiced: bool,
}

impl PaymentDraft {
    /// Turn form state into a record stamped with `now`.
    ///
    /// Rows missing an item or an amount are blank form rows and are
    /// skipped, as are rows with a non-positive amount. Every surviving row
    /// must name a catalog item.
    pub fn validate(
        &self,
        catalog: &ItemCatalog,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, ValidationError> {
        let payment_type: PaymentType = self.payment_type.parse()?;

        let mut line_items = Vec::with_capacity(self.items.len());
        for row in &self.items {
            let (Some(item_name), Some(amount)) = (non_blank(row.item_name.as_deref()), row.amount)
            else {
                continue;
            };
            if amount <= Decimal::ZERO {
                continue;
            }
            if !catalog.contains(&item_name) {
                return Err(ValidationError::UnknownItem(item_name));
            }
            line_items.push(LineItem::new(item_name, amount, row.details.as_deref()));
        }

        if line_items.is_empty() {
            return Err(ValidationError::NoLineItems);
        }

        PaymentRecord::new(
            self.client_name.as_deref(),
            self.banca_name.as_deref(),
            line_items,
            payment_type,
            self.is_invoiced,
            now,
        )
    }
}

/// Add amounts without panicking; `None` if the sum exceeds `Decimal::MAX`.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
}

/// Round to cents, half away from zero, for display.
pub fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Form amount fields arrive as numbers, numeric strings, or empty strings.
fn blank_amount_as_none<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    match Option::<RawAmount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawAmount::Number(n)) => Decimal::from_str(&n.to_string())
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(RawAmount::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawAmount::Text(s)) => Decimal::from_str(s.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
