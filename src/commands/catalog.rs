use serde::Deserialize;

use crate::catalog::ItemCatalog;
use crate::db::RecordStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogSetPayload {
    items: Vec<String>,
}

fn parse_catalog_set_payload(payload: Option<serde_json::Value>) -> Result<ItemCatalog, String> {
    let parsed: CatalogSetPayload = match payload.ok_or("Missing catalog payload")? {
        serde_json::Value::Array(items) => CatalogSetPayload {
            items: serde_json::from_value(serde_json::Value::Array(items))
                .map_err(|e| format!("Invalid catalog payload: {e}"))?,
        },
        v => serde_json::from_value(v).map_err(|e| format!("Invalid catalog payload: {e}"))?,
    };
    let catalog = ItemCatalog::new(parsed.items);
    if catalog.is_empty() {
        return Err("Catalog must contain at least one item".into());
    }
    Ok(catalog)
}

fn catalog_json(catalog: &ItemCatalog) -> serde_json::Value {
    serde_json::json!({ "items": catalog.items().collect::<Vec<_>>() })
}

pub fn catalog_get(store: &RecordStore) -> Result<serde_json::Value, String> {
    let catalog = ItemCatalog::load(store).map_err(|e| e.to_string())?;
    Ok(catalog_json(&catalog))
}

pub fn catalog_set(
    store: &RecordStore,
    arg0: Option<serde_json::Value>,
) -> Result<serde_json::Value, String> {
    let catalog = parse_catalog_set_payload(arg0)?;
    catalog.save(store).map_err(|e| e.to_string())?;
    Ok(catalog_json(&catalog))
}

pub fn catalog_reset(store: &RecordStore) -> Result<serde_json::Value, String> {
    let catalog = ItemCatalog::reset(store).map_err(|e| e.to_string())?;
    Ok(catalog_json(&catalog))
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
    fn parse_catalog_set_payload_supports_object_and_array() {
        let from_obj = parse_catalog_set_payload(Some(serde_json::json!({
            "items": ["Repair", "Cable"]
        })))
        .expect("object payload should parse");
        let from_arr = parse_catalog_set_payload(Some(serde_json::json!(["Repair", "Cable"])))
            .expect("array payload should parse");
        assert_eq!(from_obj, from_arr);
    }

    #[test]
    fn parse_catalog_set_payload_rejects_empty() {
        let err = parse_catalog_set_payload(Some(serde_json::json!({ "items": ["  "] })))
            .expect_err("empty catalog should fail");
        assert!(err.contains("at least one item"));
    }

    #[test]
    fn catalog_set_get_reset() {
        let store = test_db();
        let defaults = catalog_get(&store).unwrap();
        assert_eq!(defaults["items"][0], "Acce");

        let saved = catalog_set(&store, Some(serde_json::json!(["Repair"]))).unwrap();
        assert_eq!(saved["items"], serde_json::json!(["Repair"]));
        assert_eq!(catalog_get(&store).unwrap(), saved);

        let reset = catalog_reset(&store).unwrap();
        assert_eq!(reset, defaults);
    }
}
