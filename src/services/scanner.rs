use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

use crate::entities::scan_log;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::inventory::{InventoryItem, InventoryStore};
use crate::services::scan_log::{NewScanLog, ScanLogService};

/// Undo resolves its log row by scanning the most recent rows; this bound
/// covers any practical history depth.
const UNDO_LOOKUP_LIMIT: u64 = 1000;

const UNKNOWN: &str = "Unknown";

/// Machine-readable outcome tags surfaced to callers alongside the
/// human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanErrorCode {
    MissingSku,
    MissingLocationId,
    MissingPreviousQuantity,
    MissingLogId,
    MissingIdentifiers,
    InventoryItemNotFound,
    MultipleInventoryItemsFound,
    NoInventoryAtLocation,
    LogNotFound,
    AlreadyReverted,
    ScanError,
    RevertError,
    UndoError,
    InternalError,
}

impl ScanErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanErrorCode::MissingSku => "MISSING_SKU",
            ScanErrorCode::MissingLocationId => "MISSING_LOCATION_ID",
            ScanErrorCode::MissingPreviousQuantity => "MISSING_PREVIOUS_QUANTITY",
            ScanErrorCode::MissingLogId => "MISSING_LOG_ID",
            ScanErrorCode::MissingIdentifiers => "MISSING_IDENTIFIERS",
            ScanErrorCode::InventoryItemNotFound => "INVENTORY_ITEM_NOT_FOUND",
            ScanErrorCode::MultipleInventoryItemsFound => "MULTIPLE_INVENTORY_ITEMS_FOUND",
            ScanErrorCode::NoInventoryAtLocation => "NO_INVENTORY_AT_LOCATION",
            ScanErrorCode::LogNotFound => "LOG_NOT_FOUND",
            ScanErrorCode::AlreadyReverted => "ALREADY_REVERTED",
            ScanErrorCode::ScanError => "SCAN_ERROR",
            ScanErrorCode::RevertError => "REVERT_ERROR",
            ScanErrorCode::UndoError => "UNDO_ERROR",
            ScanErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Identity and quantity movement of the item an operation touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScannedProduct {
    pub id: String,
    pub title: String,
    pub sku: String,
    pub previous_quantity: i32,
    pub current_quantity: i32,
}

/// Structured result of every scanner operation. Expected failures are
/// values of this type, never errors; only the transport layer converts
/// them to HTTP statuses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ScannedProduct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ScanErrorCode>,
}

impl ScanOutcome {
    pub fn failure(message: impl Into<String>, error: ScanErrorCode) -> Self {
        Self {
            success: false,
            message: message.into(),
            product: None,
            log_id: None,
            error: Some(error),
        }
    }
}

/// Orchestrates the scan/revert/undo workflow against the inventory store
/// and the scan log. All collaborators are injected; the service holds no
/// ambient state beyond the per-level lock map.
pub struct ScannerService {
    inventory: Arc<dyn InventoryStore>,
    scan_logs: Arc<ScanLogService>,
    event_sender: Arc<EventSender>,
    // Serializes read-modify-write windows per (item, location) within this
    // process. The store interface is plain set-quantity, so writers in
    // other processes can still race; callers needing cross-process safety
    // need a compare-and-set primitive at the store layer.
    level_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl ScannerService {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        scan_logs: Arc<ScanLogService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            inventory,
            scan_logs,
            event_sender,
            level_locks: DashMap::new(),
        }
    }

    /// Scans one unit of `sku` at `location_id`: decrements the stocked
    /// quantity by one (floored at zero) and records the attempt in the
    /// scan log. Unexpected failures are themselves logged and reported as
    /// a `SCAN_ERROR` outcome carrying the failure row's id.
    #[instrument(skip(self))]
    pub async fn scan(&self, sku: &str, location_id: &str) -> ScanOutcome {
        match self.scan_inner(sku, location_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%sku, %location_id, error = %err, "Scan failed unexpectedly");
                let message = format!("Error scanning product: {}", err);
                let log_id = self.record_failed_attempt(sku, location_id, &message).await;
                ScanOutcome {
                    success: false,
                    message,
                    product: None,
                    log_id,
                    error: Some(ScanErrorCode::ScanError),
                }
            }
        }
    }

    async fn scan_inner(
        &self,
        sku: &str,
        location_id: &str,
    ) -> Result<ScanOutcome, ServiceError> {
        let item = match self.resolve_item(sku).await? {
            ItemLookup::Found(item) => item,
            ItemLookup::NotFound => {
                let message = format!("No inventory item found with SKU: {}", sku);
                let log = self
                    .scan_logs
                    .create(NewScanLog {
                        sku: sku.to_string(),
                        location_id: location_id.to_string(),
                        location_name: UNKNOWN.to_string(),
                        product_title: UNKNOWN.to_string(),
                        previous_quantity: 0,
                        current_quantity: 0,
                        success: false,
                        message: message.clone(),
                    })
                    .await?;
                return Ok(ScanOutcome {
                    success: false,
                    message,
                    product: None,
                    log_id: Some(log.id),
                    error: Some(ScanErrorCode::InventoryItemNotFound),
                });
            }
            ItemLookup::Ambiguous(count) => {
                warn!(%sku, matches = count, "Multiple inventory items share one SKU");
                return Ok(ScanOutcome::failure(
                    format!(
                        "Multiple inventory items found with SKU: {}. This is a data integrity issue.",
                        sku
                    ),
                    ScanErrorCode::MultipleInventoryItemsFound,
                ));
            }
        };

        let (previous_quantity, new_quantity) = {
            let lock = self.level_lock(&item.id, location_id);
            let _guard = lock.lock().await;

            let levels = self.inventory.find_levels(&item.id, location_id).await?;
            let Some(level) = levels.first() else {
                return Ok(ScanOutcome::failure(
                    format!(
                        "Inventory item with SKU {} has no inventory at location: {}",
                        sku, location_id
                    ),
                    ScanErrorCode::NoInventoryAtLocation,
                ));
            };

            let previous_quantity = level.stocked_quantity.unwrap_or(0);
            let new_quantity = (previous_quantity - 1).max(0);
            self.inventory
                .set_stocked_quantity(&item.id, location_id, new_quantity)
                .await?;
            (previous_quantity, new_quantity)
        };

        let location_name = self.resolve_location_name(location_id).await?;
        let title = item.title.clone().unwrap_or_else(|| UNKNOWN.to_string());
        let message = format!("Successfully scanned SKU: {}", sku);

        let log = self
            .scan_logs
            .create(NewScanLog {
                sku: sku.to_string(),
                location_id: location_id.to_string(),
                location_name,
                product_title: title.clone(),
                previous_quantity,
                current_quantity: new_quantity,
                success: true,
                message: message.clone(),
            })
            .await?;

        self.publish(Event::ScanRecorded {
            sku: sku.to_string(),
            location_id: location_id.to_string(),
            previous_quantity,
            new_quantity,
            log_id: log.id.clone(),
        })
        .await;

        Ok(ScanOutcome {
            success: true,
            message,
            product: Some(ScannedProduct {
                id: item.id,
                title,
                sku: item.sku,
                previous_quantity,
                current_quantity: new_quantity,
            }),
            log_id: Some(log.id),
            error: None,
        })
    }

    /// Applies `scan` to each identifier in order, one at a time, collecting
    /// one outcome per identifier and continuing past failures. Sequential
    /// on purpose: duplicate identifiers in one batch must observe each
    /// other's decrements.
    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    pub async fn bulk_scan(&self, identifiers: &[String], location_id: &str) -> Vec<ScanOutcome> {
        let mut results = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            results.push(self.scan(identifier, location_id).await);
        }
        results
    }

    /// Restores inventory to a caller-supplied quantity, a direct overwrite
    /// that does not inspect the current value. When a log id is supplied,
    /// that row is tagged reverted; failing to tag it does not fail the
    /// revert itself.
    #[instrument(skip(self))]
    pub async fn revert(
        &self,
        sku: &str,
        location_id: &str,
        previous_quantity: i32,
        log_id: Option<&str>,
    ) -> ScanOutcome {
        match self
            .revert_inner(sku, location_id, previous_quantity, log_id)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%sku, %location_id, error = %err, "Revert failed unexpectedly");
                ScanOutcome::failure(
                    format!("Error reverting scan: {}", err),
                    ScanErrorCode::RevertError,
                )
            }
        }
    }

    async fn revert_inner(
        &self,
        sku: &str,
        location_id: &str,
        previous_quantity: i32,
        log_id: Option<&str>,
    ) -> Result<ScanOutcome, ServiceError> {
        let item = match self.resolve_item(sku).await? {
            ItemLookup::Found(item) => item,
            ItemLookup::NotFound => {
                return Ok(ScanOutcome::failure(
                    format!("No inventory item found with SKU: {}", sku),
                    ScanErrorCode::InventoryItemNotFound,
                ));
            }
            ItemLookup::Ambiguous(count) => {
                warn!(%sku, matches = count, "Multiple inventory items share one SKU");
                return Ok(ScanOutcome::failure(
                    format!(
                        "Multiple inventory items found with SKU: {}. This is a data integrity issue.",
                        sku
                    ),
                    ScanErrorCode::MultipleInventoryItemsFound,
                ));
            }
        };

        let current_quantity = {
            let lock = self.level_lock(&item.id, location_id);
            let _guard = lock.lock().await;

            let levels = self.inventory.find_levels(&item.id, location_id).await?;
            let Some(level) = levels.first() else {
                return Ok(ScanOutcome::failure(
                    format!(
                        "Inventory item with SKU {} has no inventory at location: {}",
                        sku, location_id
                    ),
                    ScanErrorCode::NoInventoryAtLocation,
                ));
            };

            // Read for reporting only; the overwrite below is unconditional.
            let current_quantity = level.stocked_quantity.unwrap_or(0);
            self.inventory
                .set_stocked_quantity(&item.id, location_id, previous_quantity)
                .await?;
            current_quantity
        };

        if let Some(log_id) = log_id {
            if let Err(err) = self.scan_logs.mark_reverted(log_id).await {
                warn!(%log_id, error = %err, "Failed to mark scan log as reverted");
            }
        }

        self.publish(Event::ScanReverted {
            sku: sku.to_string(),
            location_id: location_id.to_string(),
            restored_quantity: previous_quantity,
            log_id: log_id.map(str::to_string),
        })
        .await;

        let title = item.title.clone().unwrap_or_else(|| UNKNOWN.to_string());
        Ok(ScanOutcome {
            success: true,
            message: format!("Successfully reverted inventory for {}", title),
            product: Some(ScannedProduct {
                id: item.id,
                title,
                sku: item.sku,
                previous_quantity: current_quantity,
                current_quantity: previous_quantity,
            }),
            log_id: None,
            error: None,
        })
    }

    /// Fully reverses the scan a log row records: restores the quantity the
    /// row captured before the scan, then deletes the row. A second undo of
    /// the same id fails with `LOG_NOT_FOUND` since the row is gone.
    #[instrument(skip(self))]
    pub async fn undo(&self, log_id: &str) -> ScanOutcome {
        match self.undo_inner(log_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%log_id, error = %err, "Undo failed unexpectedly");
                ScanOutcome::failure(
                    format!("Error undoing scan: {}", err),
                    ScanErrorCode::UndoError,
                )
            }
        }
    }

    async fn undo_inner(&self, log_id: &str) -> Result<ScanOutcome, ServiceError> {
        let logs = self.scan_logs.list(UNDO_LOOKUP_LIMIT).await?;
        let Some(log) = logs.into_iter().find(|row| row.id == log_id) else {
            return Ok(ScanOutcome::failure(
                format!("Scan log not found: {}", log_id),
                ScanErrorCode::LogNotFound,
            ));
        };

        if log.reverted {
            return Ok(ScanOutcome::failure(
                "Scan has already been reverted",
                ScanErrorCode::AlreadyReverted,
            ));
        }

        let items = self.inventory.find_items_by_sku(&log.sku).await?;
        let Some(item) = items.into_iter().find(|item| item.sku == log.sku) else {
            return Ok(ScanOutcome::failure(
                format!("Inventory item not found for SKU: {}", log.sku),
                ScanErrorCode::InventoryItemNotFound,
            ));
        };

        {
            let lock = self.level_lock(&item.id, &log.location_id);
            let _guard = lock.lock().await;

            let levels = self
                .inventory
                .find_levels(&item.id, &log.location_id)
                .await?;
            if levels.is_empty() {
                return Ok(ScanOutcome::failure(
                    format!(
                        "Inventory item with SKU {} has no inventory at location: {}",
                        log.sku, log.location_id
                    ),
                    ScanErrorCode::NoInventoryAtLocation,
                ));
            }

            self.inventory
                .set_stocked_quantity(&item.id, &log.location_id, log.previous_quantity)
                .await?;
        }

        self.scan_logs.delete_one(&log.id).await?;

        self.publish(Event::ScanUndone {
            sku: log.sku.clone(),
            location_id: log.location_id.clone(),
            restored_quantity: log.previous_quantity,
            log_id: log.id.clone(),
        })
        .await;

        let title = item.title.clone().unwrap_or_else(|| UNKNOWN.to_string());
        Ok(ScanOutcome {
            success: true,
            message: format!("Successfully undone scan for SKU: {}", log.sku),
            product: Some(ScannedProduct {
                id: item.id,
                title,
                sku: item.sku,
                // Callers read "current" as the restored value and
                // "previous" as what the row recorded after the scan.
                previous_quantity: log.current_quantity,
                current_quantity: log.previous_quantity,
            }),
            log_id: None,
            error: None,
        })
    }

    /// Returns the most recent log rows, newest first.
    pub async fn list_logs(&self, limit: u64) -> Result<Vec<scan_log::Model>, ServiceError> {
        self.scan_logs.list(limit).await
    }

    /// Deletes every log row, returning how many were removed.
    pub async fn clear_logs(&self) -> Result<u64, ServiceError> {
        let deleted = self.scan_logs.delete_all().await?;
        self.publish(Event::ScanLogsCleared { deleted }).await;
        Ok(deleted)
    }

    /// Exact-match resolution over the store's (possibly loose) SKU lookup.
    async fn resolve_item(&self, sku: &str) -> Result<ItemLookup, ServiceError> {
        let items = self.inventory.find_items_by_sku(sku).await?;
        let mut exact: Vec<InventoryItem> =
            items.into_iter().filter(|item| item.sku == sku).collect();

        match exact.len() {
            0 => Ok(ItemLookup::NotFound),
            1 => Ok(ItemLookup::Found(exact.remove(0))),
            count => Ok(ItemLookup::Ambiguous(count)),
        }
    }

    async fn resolve_location_name(&self, location_id: &str) -> Result<String, ServiceError> {
        let locations = self.inventory.list_locations().await?;
        Ok(locations
            .into_iter()
            .find(|location| location.id == location_id)
            .map(|location| location.name)
            .unwrap_or_else(|| location_id.to_string()))
    }

    fn level_lock(&self, item_id: &str, location_id: &str) -> Arc<Mutex<()>> {
        self.level_locks
            .entry((item_id.to_string(), location_id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Best-effort: the scan log, not the event stream, is the record.
    async fn publish(&self, event: Event) {
        if let Err(err) = self.event_sender.send(event).await {
            warn!(error = %err, "Failed to publish scanner event");
        }
    }

    async fn record_failed_attempt(
        &self,
        sku: &str,
        location_id: &str,
        message: &str,
    ) -> Option<String> {
        match self
            .scan_logs
            .create(NewScanLog {
                sku: sku.to_string(),
                location_id: location_id.to_string(),
                location_name: UNKNOWN.to_string(),
                product_title: UNKNOWN.to_string(),
                previous_quantity: 0,
                current_quantity: 0,
                success: false,
                message: message.to_string(),
            })
            .await
        {
            Ok(log) => Some(log.id),
            Err(err) => {
                warn!(%sku, error = %err, "Failed to record failed scan attempt");
                None
            }
        }
    }
}

enum ItemLookup {
    Found(InventoryItem),
    NotFound,
    Ambiguous(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_to_wire_tags() {
        for (code, tag) in [
            (ScanErrorCode::MissingSku, "MISSING_SKU"),
            (ScanErrorCode::InventoryItemNotFound, "INVENTORY_ITEM_NOT_FOUND"),
            (
                ScanErrorCode::MultipleInventoryItemsFound,
                "MULTIPLE_INVENTORY_ITEMS_FOUND",
            ),
            (ScanErrorCode::NoInventoryAtLocation, "NO_INVENTORY_AT_LOCATION"),
            (ScanErrorCode::AlreadyReverted, "ALREADY_REVERTED"),
            (ScanErrorCode::ScanError, "SCAN_ERROR"),
        ] {
            assert_eq!(code.as_str(), tag);
            assert_eq!(
                serde_json::to_value(code).unwrap(),
                serde_json::Value::String(tag.to_string())
            );
        }
    }

    #[test]
    fn failure_outcome_carries_no_product_or_log() {
        let outcome = ScanOutcome::failure("nope", ScanErrorCode::LogNotFound);
        assert!(!outcome.success);
        assert!(outcome.product.is_none());
        assert!(outcome.log_id.is_none());
        assert_eq!(outcome.error, Some(ScanErrorCode::LogNotFound));
    }
}
