use async_trait::async_trait;
use dashmap::DashMap;

use super::{InventoryItem, InventoryLevel, InventoryStore, StockLocation};
use crate::errors::ServiceError;

/// In-memory inventory store for local development and tests. Matches SKUs
/// case-insensitively, mimicking the loose lookup of real backends, so the
/// scan engine's exact-match post-filter is exercised.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    items: DashMap<String, InventoryItem>,
    // (item_id, location_id) -> stocked quantity; None models an upstream
    // level row with no quantity recorded
    levels: DashMap<(String, String), Option<i32>>,
    locations: DashMap<String, String>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, id: &str, sku: &str, title: Option<&str>) {
        self.items.insert(
            id.to_string(),
            InventoryItem {
                id: id.to_string(),
                sku: sku.to_string(),
                title: title.map(str::to_string),
            },
        );
    }

    pub fn add_location(&self, id: &str, name: &str) {
        self.locations.insert(id.to_string(), name.to_string());
    }

    pub fn set_level(&self, item_id: &str, location_id: &str, quantity: impl Into<Option<i32>>) {
        self.levels.insert(
            (item_id.to_string(), location_id.to_string()),
            quantity.into(),
        );
    }

    pub fn stocked_quantity(&self, item_id: &str, location_id: &str) -> Option<i32> {
        self.levels
            .get(&(item_id.to_string(), location_id.to_string()))
            .and_then(|entry| *entry.value())
    }

    /// Seeds the demo catalog used when the service runs without a remote
    /// inventory backend.
    pub fn seed_demo_catalog(&self) {
        self.add_location("loc_1", "Main Warehouse");
        self.add_item("iitem_med_a", "MED-A-001", Some("Test Medicine A"));
        self.add_item("iitem_med_b", "MED-B-001", Some("Test Medicine B"));
        self.add_item("iitem_med_c", "MED-C-001", Some("Test Medicine C"));
        self.set_level("iitem_med_a", "loc_1", 10);
        self.set_level("iitem_med_b", "loc_1", 25);
        self.set_level("iitem_med_c", "loc_1", 50);
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn find_items_by_sku(&self, sku: &str) -> Result<Vec<InventoryItem>, ServiceError> {
        let mut matches: Vec<InventoryItem> = self
            .items
            .iter()
            .filter(|entry| entry.value().sku.eq_ignore_ascii_case(sku))
            .map(|entry| entry.value().clone())
            .collect();
        // DashMap iteration order is unstable; keep results deterministic
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    async fn find_levels(
        &self,
        item_id: &str,
        location_id: &str,
    ) -> Result<Vec<InventoryLevel>, ServiceError> {
        let key = (item_id.to_string(), location_id.to_string());
        Ok(self
            .levels
            .get(&key)
            .map(|entry| {
                vec![InventoryLevel {
                    id: format!("ilev_{}_{}", item_id, location_id),
                    stocked_quantity: *entry.value(),
                }]
            })
            .unwrap_or_default())
    }

    async fn set_stocked_quantity(
        &self,
        item_id: &str,
        location_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        self.levels.insert(
            (item_id.to_string(), location_id.to_string()),
            Some(quantity),
        );
        Ok(())
    }

    async fn list_locations(&self) -> Result<Vec<StockLocation>, ServiceError> {
        let mut locations: Vec<StockLocation> = self
            .locations
            .iter()
            .map(|entry| StockLocation {
                id: entry.key().clone(),
                name: entry.value().clone(),
            })
            .collect();
        locations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sku_lookup_is_case_insensitive() {
        let store = InMemoryInventoryStore::new();
        store.add_item("iitem_1", "MED-A-001", Some("Test Medicine A"));

        let matches = store.find_items_by_sku("med-a-001").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].sku, "MED-A-001");
    }

    #[tokio::test]
    async fn missing_level_yields_no_rows() {
        let store = InMemoryInventoryStore::new();
        store.add_item("iitem_1", "MED-A-001", None);

        let levels = store.find_levels("iitem_1", "loc_1").await.unwrap();
        assert!(levels.is_empty());
    }
}
