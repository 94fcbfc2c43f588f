//! Item catalog: the list of item names a line item may use.
//!
//! The catalog is runtime configuration. It lives in `local_settings`
//! (category `catalog`, key `items`) as a JSON array and falls back to the
//! built-in defaults when nothing has been saved yet.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::RecordStore;
use crate::error::StorageError;

const SETTINGS_CATEGORY: &str = "catalog";
const SETTINGS_KEY: &str = "items";

pub const DEFAULT_ITEMS: &[&str] = &[
    "Acce",
    "PC",
    "PS4",
    "Cartucho CANON",
    "Cheq",
    "Tin",
    "Cop",
    "HV",
    "Del",
    "Eng",
    "Esc",
    "Eset",
    "Factura",
    "Fig",
    "Imp",
    "Foto",
    "Imp PE",
    "Office",
    "Plas",
    "RP",
    "FF",
    "Reda",
    "Scan",
    "Tarjeta",
    "Técnico",
    "Var",
    "Netflix",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCatalog {
    items: IndexSet<String>,
}

impl Default for ItemCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_ITEMS.iter().copied())
    }
}

impl ItemCatalog {
    /// Build a catalog, trimming names and dropping blanks and duplicates.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items = items
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { items }
    }

    pub fn contains(&self, item_name: &str) -> bool {
        self.items.contains(item_name.trim())
    }

    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Load the saved catalog, or the defaults if none is saved or the
    /// saved value cannot be parsed.
    pub fn load(store: &RecordStore) -> Result<Self, StorageError> {
        let Some(raw) = store.get_setting(SETTINGS_CATEGORY, SETTINGS_KEY)? else {
            return Ok(Self::default());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(items) => {
                let catalog = Self::new(items);
                if catalog.is_empty() {
                    warn!("Saved item catalog is empty, using defaults");
                    return Ok(Self::default());
                }
                Ok(catalog)
            }
            Err(e) => {
                warn!("Saved item catalog is malformed ({e}), using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, store: &RecordStore) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.items)
            .map_err(|e| StorageError::Corrupt(format!("serialize catalog: {e}")))?;
        store.set_setting(SETTINGS_CATEGORY, SETTINGS_KEY, &raw)?;
        info!(items = self.items.len(), "Item catalog saved");
        Ok(())
    }

    /// Drop any saved catalog so the defaults apply again.
    pub fn reset(store: &RecordStore) -> Result<Self, StorageError> {
        store.delete_setting(SETTINGS_CATEGORY, SETTINGS_KEY)?;
        info!("Item catalog reset to defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> RecordStore {
        let store = RecordStore::open_in_memory().expect("open in-memory db");
        store.initialize().expect("initialize schema");
        store
    }

    #[test]
    fn test_default_catalog_contents() {
        let catalog = ItemCatalog::default();
        assert_eq!(catalog.len(), DEFAULT_ITEMS.len());
        assert!(catalog.contains("PC"));
        assert!(catalog.contains(" Técnico "));
        assert!(!catalog.contains("pc"));
        assert_eq!(catalog.items().next(), Some("Acce"));
    }

    #[test]
    fn test_new_trims_and_dedupes() {
        let catalog = ItemCatalog::new(["PC", " PC ", "", "Scan"]);
        assert_eq!(catalog.items().collect::<Vec<_>>(), vec!["PC", "Scan"]);
    }

    #[test]
    fn test_load_without_saved_catalog_uses_defaults() {
        let store = test_db();
        assert_eq!(ItemCatalog::load(&store).unwrap(), ItemCatalog::default());
    }

    #[test]
    fn test_save_load_and_reset() {
        let store = test_db();
        let custom = ItemCatalog::new(["Repair", "Cable"]);
        custom.save(&store).expect("save catalog");

        let loaded = ItemCatalog::load(&store).expect("load catalog");
        assert_eq!(loaded, custom);
        assert!(!loaded.contains("PC"));

        let reset = ItemCatalog::reset(&store).expect("reset catalog");
        assert_eq!(reset, ItemCatalog::default());
        assert_eq!(ItemCatalog::load(&store).unwrap(), ItemCatalog::default());
    }

    #[test]
    fn test_malformed_saved_catalog_falls_back_to_defaults() {
        let store = test_db();
        store
            .set_setting(SETTINGS_CATEGORY, SETTINGS_KEY, "{not json")
            .unwrap();
        assert_eq!(ItemCatalog::load(&store).unwrap(), ItemCatalog::default());
    }
}
