pub mod memory;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

pub use memory::InMemoryInventoryStore;
pub use remote::HttpInventoryStore;

/// An inventory item as the external store reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub sku: String,
    pub title: Option<String>,
}

/// A stock level for one (item, location) pair. `stocked_quantity` may be
/// absent upstream; callers treat missing as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub id: String,
    pub stocked_quantity: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLocation {
    pub id: String,
    pub name: String,
}

/// Boundary to the commerce platform's inventory store. The store is ground
/// truth for quantities; this service only reads levels and overwrites
/// stocked quantities through it.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Looks up inventory items by SKU. Backends are not assumed to filter
    /// exactly (some match loosely); callers must post-filter for exact
    /// SKU equality.
    async fn find_items_by_sku(&self, sku: &str) -> Result<Vec<InventoryItem>, ServiceError>;

    /// Lists stock levels for an item at a location.
    async fn find_levels(
        &self,
        item_id: &str,
        location_id: &str,
    ) -> Result<Vec<InventoryLevel>, ServiceError>;

    /// Overwrites the stocked quantity for an item at a location. Plain
    /// set-quantity, not compare-and-swap: cross-process writers can race.
    async fn set_stocked_quantity(
        &self,
        item_id: &str,
        location_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError>;

    /// Lists all stock locations.
    async fn list_locations(&self) -> Result<Vec<StockLocation>, ServiceError>;
}
