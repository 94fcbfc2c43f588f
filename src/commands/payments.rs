use chrono::Utc;
use serde::Deserialize;

use crate::catalog::ItemCatalog;
use crate::commands::parse_day;
use crate::db::RecordStore;
use crate::model::PaymentDraft;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentListPayload {
    #[serde(default, alias = "day")]
    date: Option<String>,
}

fn parse_payment_draft(payload: Option<serde_json::Value>) -> Result<PaymentDraft, String> {
    serde_json::from_value(payload.ok_or("Missing payment payload")?)
        .map_err(|e| format!("Invalid payment payload: {e}"))
}

fn parse_payment_list_payload(
    payload: Option<serde_json::Value>,
) -> Result<PaymentListPayload, String> {
    match payload {
        None | Some(serde_json::Value::Null) => Ok(PaymentListPayload::default()),
        Some(serde_json::Value::String(date)) => Ok(PaymentListPayload { date: Some(date) }),
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid payment list payload: {e}")),
    }
}

/// Validate a payment form and append it to the daybook.
pub fn payment_add(
    store: &RecordStore,
    arg0: Option<serde_json::Value>,
) -> Result<serde_json::Value, String> {
    let draft = parse_payment_draft(arg0)?;
    let catalog = ItemCatalog::load(store).map_err(|e| e.to_string())?;
    let record = draft
        .validate(&catalog, Utc::now())
        .map_err(|e| e.to_string())?;
    let payment_id = store.append(&record).map_err(|e| e.to_string())?;

    Ok(serde_json::json!({
        "success": true,
        "paymentId": payment_id,
        "total": record.total,
        "display": record.to_string(),
    }))
}

/// List stored payments, optionally only those of one day.
pub fn payment_list(
    store: &RecordStore,
    arg0: Option<serde_json::Value>,
) -> Result<serde_json::Value, String> {
    let payload = parse_payment_list_payload(arg0)?;
    let day = parse_day(payload.date.as_deref()).map_err(|e| e.to_string())?;
    let records = match day {
        Some(day) => store.list_for_day(day),
        None => store.list_all(),
    }
    .map_err(|e| e.to_string())?;

    serde_json::to_value(records).map_err(|e| format!("serialize payments: {e}"))
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    fn test_db() -> RecordStore {
        let store = RecordStore::open_in_memory().expect("open in-memory db");
        store.initialize().expect("initialize schema");
        store
    }

    #[test]
    fn parse_payment_draft_requires_payload() {
        let err = parse_payment_draft(None).expect_err("missing payload should fail");
        assert_eq!(err, "Missing payment payload");
    }

    #[test]
    fn parse_payment_draft_supports_snake_case_aliases() {
        let draft = parse_payment_draft(Some(serde_json::json!({
            "client_name": "Ana",
            "line_items": [{ "item_name": "PC", "amount": "10" }],
            "payment_type": "cash",
            "is_invoiced": true
        })))
        .expect("alias payload should parse");
        assert_eq!(draft.client_name.as_deref(), Some("Ana"));
        assert_eq!(draft.items.len(), 1);
        assert!(draft.is_invoiced);
    }

    #[test]
    fn parse_payment_list_payload_supports_object_and_string() {
        let from_obj = parse_payment_list_payload(Some(serde_json::json!({ "date": "2026-10-19" })))
            .expect("object should parse");
        let from_str = parse_payment_list_payload(Some(serde_json::json!("2026-10-18")))
            .expect("string should parse");
        assert_eq!(from_obj.date.as_deref(), Some("2026-10-19"));
        assert_eq!(from_str.date.as_deref(), Some("2026-10-18"));
        assert!(parse_payment_list_payload(None).unwrap().date.is_none());
    }

    #[test]
    fn payment_add_then_list() {
        let store = test_db();
        let result = payment_add(
            &store,
            Some(serde_json::json!({
                "clientName": "Ana",
                "items": [
                    { "itemName": "PC", "amount": 20 },
                    { "itemName": "Acce", "amount": "5.50", "details": "mouse" }
                ],
                "paymentType": "banca",
                "bancaName": "Luis",
                "isInvoiced": true
            })),
        )
        .expect("payment_add");
        assert_eq!(result["success"], true);
        assert_eq!(result["total"], "25.50");
        assert!(result["display"]
            .as_str()
            .unwrap()
            .starts_with("Client: Ana, Type: Banca, Invoiced: Yes"));

        let listed = payment_list(&store, None).expect("payment_list");
        let arr = listed.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["id"], result["paymentId"]);
        assert_eq!(arr[0]["bancaName"], "Luis");
        assert_eq!(arr[0]["paymentType"], "banca");
        assert_eq!(arr[0]["lineItems"][1]["details"], "mouse");
    }

    #[test]
    fn payment_add_rejects_unknown_item_without_writing() {
        let store = test_db();
        let err = payment_add(
            &store,
            Some(serde_json::json!({
                "items": [{ "itemName": "Select an item", "amount": 3 }],
                "paymentType": "cash"
            })),
        )
        .expect_err("unknown item should fail");
        assert!(err.contains("unknown item"));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn payment_add_rejects_amounts_too_large_to_total() {
        let store = test_db();
        let err = payment_add(
            &store,
            Some(serde_json::json!({
                "items": [
                    { "itemName": "PC", "amount": "79228162514264337593543950335" },
                    { "itemName": "Acce", "amount": "1" }
                ],
                "paymentType": "cash"
            })),
        )
        .expect_err("overflowing total should fail");
        assert!(err.contains("too large"));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn payment_list_rejects_bad_date() {
        let store = test_db();
        let err = payment_list(&store, Some(serde_json::json!({ "date": "yesterday" })))
            .expect_err("bad date should fail");
        assert!(err.contains("invalid date"));
    }
}
