use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use stockscan_api::{
    db::{establish_connection, run_migrations},
    errors::ServiceError,
    events::{Event, EventSender},
    inventory::{
        InMemoryInventoryStore, InventoryItem, InventoryLevel, InventoryStore, StockLocation,
    },
    services::{
        scan_log::ScanLogService,
        scanner::{ScanErrorCode, ScannerService},
    },
};

struct TestContext {
    store: Arc<InMemoryInventoryStore>,
    scanner: ScannerService,
    _event_rx: mpsc::Receiver<Event>,
}

/// Each test gets its own named shared-cache sqlite database so tests can
/// run in parallel without sharing log rows.
async fn setup(db_name: &str) -> TestContext {
    let url = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);
    let db = Arc::new(
        establish_connection(&url)
            .await
            .expect("Failed to create DB pool"),
    );
    run_migrations(db.as_ref())
        .await
        .expect("Failed to run migrations");

    let (tx, rx) = mpsc::channel(64);
    let store = Arc::new(InMemoryInventoryStore::new());
    let inventory: Arc<dyn InventoryStore> = store.clone();
    let scanner = ScannerService::new(
        inventory,
        Arc::new(ScanLogService::new(db)),
        Arc::new(EventSender::new(tx)),
    );

    TestContext {
        store,
        scanner,
        _event_rx: rx,
    }
}

fn seed_med_a(ctx: &TestContext, quantity: i32) {
    ctx.store.add_location("loc_1", "Main Warehouse");
    ctx.store
        .add_item("iitem_med_a", "MED-A-001", Some("Test Medicine A"));
    ctx.store.set_level("iitem_med_a", "loc_1", quantity);
}

#[tokio::test]
async fn scan_decrements_by_one_and_logs_snapshot() {
    let ctx = setup("scan_decrements").await;
    seed_med_a(&ctx, 10);

    let outcome = ctx.scanner.scan("MED-A-001", "loc_1").await;

    assert!(outcome.success, "unexpected failure: {}", outcome.message);
    let product = outcome.product.expect("product expected");
    assert_eq!(product.previous_quantity, 10);
    assert_eq!(product.current_quantity, 9);
    assert_eq!(product.sku, "MED-A-001");
    assert_eq!(ctx.store.stocked_quantity("iitem_med_a", "loc_1"), Some(9));

    let logs = ctx.scanner.list_logs(10).await.unwrap();
    assert_eq!(logs.len(), 1);
    let row = &logs[0];
    assert_eq!(row.id, outcome.log_id.unwrap());
    assert!(row.success);
    assert_eq!(row.previous_quantity, 10);
    assert_eq!(row.current_quantity, 9);
    assert_eq!(row.product_title, "Test Medicine A");
    assert_eq!(row.location_name, "Main Warehouse");
    assert!(!row.reverted);
    assert!(row.reverted_at.is_none());
}

#[tokio::test]
async fn scan_never_drives_quantity_negative() {
    let ctx = setup("scan_floor_zero").await;
    seed_med_a(&ctx, 0);

    let outcome = ctx.scanner.scan("MED-A-001", "loc_1").await;

    assert!(outcome.success);
    let product = outcome.product.unwrap();
    assert_eq!(product.previous_quantity, 0);
    assert_eq!(product.current_quantity, 0);
    assert_eq!(ctx.store.stocked_quantity("iitem_med_a", "loc_1"), Some(0));
}

#[tokio::test]
async fn level_without_recorded_quantity_reads_as_zero() {
    let ctx = setup("scan_null_level").await;
    ctx.store.add_location("loc_1", "Main Warehouse");
    ctx.store.add_item("iitem_med_a", "MED-A-001", None);
    ctx.store.set_level("iitem_med_a", "loc_1", None);

    let outcome = ctx.scanner.scan("MED-A-001", "loc_1").await;

    assert!(outcome.success);
    let product = outcome.product.unwrap();
    assert_eq!(product.previous_quantity, 0);
    assert_eq!(product.current_quantity, 0);
}

#[tokio::test]
async fn unknown_sku_fails_and_writes_exactly_one_log_row() {
    let ctx = setup("scan_unknown_sku").await;
    ctx.store.add_location("loc_1", "Main Warehouse");

    let outcome = ctx.scanner.scan("NOPE-999", "loc_1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(ScanErrorCode::InventoryItemNotFound));
    let log_id = outcome.log_id.expect("failed scans still produce a log id");

    let logs = ctx.scanner.list_logs(10).await.unwrap();
    assert_eq!(logs.len(), 1);
    let row = &logs[0];
    assert_eq!(row.id, log_id);
    assert!(!row.success);
    assert_eq!(row.previous_quantity, 0);
    assert_eq!(row.current_quantity, 0);
    assert_eq!(row.product_title, "Unknown");
    assert_eq!(row.location_name, "Unknown");
}

#[tokio::test]
async fn duplicate_sku_fails_without_a_log_row() {
    let ctx = setup("scan_duplicate_sku").await;
    ctx.store.add_location("loc_1", "Main Warehouse");
    ctx.store.add_item("iitem_a", "MED-A-001", Some("Test Medicine A"));
    ctx.store.add_item("iitem_b", "MED-A-001", Some("Shadow copy"));
    ctx.store.set_level("iitem_a", "loc_1", 10);

    let outcome = ctx.scanner.scan("MED-A-001", "loc_1").await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error,
        Some(ScanErrorCode::MultipleInventoryItemsFound)
    );
    assert!(outcome.log_id.is_none());
    // Regression guard: the data-integrity branch must leave the log alone
    assert!(ctx.scanner.list_logs(10).await.unwrap().is_empty());
    // And the live quantity untouched
    assert_eq!(ctx.store.stocked_quantity("iitem_a", "loc_1"), Some(10));
}

#[tokio::test]
async fn missing_level_fails_without_a_log_row() {
    let ctx = setup("scan_missing_level").await;
    ctx.store.add_location("loc_1", "Main Warehouse");
    ctx.store
        .add_item("iitem_med_a", "MED-A-001", Some("Test Medicine A"));

    let outcome = ctx.scanner.scan("MED-A-001", "loc_1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(ScanErrorCode::NoInventoryAtLocation));
    assert!(outcome.log_id.is_none());
    assert!(ctx.scanner.list_logs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn unregistered_location_falls_back_to_raw_id() {
    let ctx = setup("scan_location_fallback").await;
    ctx.store
        .add_item("iitem_med_a", "MED-A-001", Some("Test Medicine A"));
    ctx.store.set_level("iitem_med_a", "loc_ghost", 3);

    let outcome = ctx.scanner.scan("MED-A-001", "loc_ghost").await;

    assert!(outcome.success);
    let logs = ctx.scanner.list_logs(10).await.unwrap();
    assert_eq!(logs[0].location_name, "loc_ghost");
}

#[tokio::test]
async fn undo_restores_quantity_and_deletes_the_row() {
    let ctx = setup("undo_happy_path").await;
    seed_med_a(&ctx, 10);

    let scan = ctx.scanner.scan("MED-A-001", "loc_1").await;
    assert!(scan.success);
    assert_eq!(ctx.store.stocked_quantity("iitem_med_a", "loc_1"), Some(9));
    let log_id = scan.log_id.unwrap();

    let undo = ctx.scanner.undo(&log_id).await;

    assert!(undo.success, "unexpected failure: {}", undo.message);
    assert_eq!(ctx.store.stocked_quantity("iitem_med_a", "loc_1"), Some(10));
    let product = undo.product.unwrap();
    // Callers read "current" as the restored value
    assert_eq!(product.current_quantity, 10);
    assert_eq!(product.previous_quantity, 9);

    let logs = ctx.scanner.list_logs(10).await.unwrap();
    assert!(logs.iter().all(|row| row.id != log_id));
}

#[tokio::test]
async fn undo_is_not_repeatable() {
    let ctx = setup("undo_twice").await;
    seed_med_a(&ctx, 10);

    let scan = ctx.scanner.scan("MED-A-001", "loc_1").await;
    let log_id = scan.log_id.unwrap();

    assert!(ctx.scanner.undo(&log_id).await.success);

    let second = ctx.scanner.undo(&log_id).await;
    assert!(!second.success);
    assert_eq!(second.error, Some(ScanErrorCode::LogNotFound));
}

#[tokio::test]
async fn undo_refuses_rows_already_marked_reverted() {
    let ctx = setup("undo_reverted_row").await;
    seed_med_a(&ctx, 10);

    let scan = ctx.scanner.scan("MED-A-001", "loc_1").await;
    let log_id = scan.log_id.unwrap();

    // Revert with the log id tags the row but leaves it in place
    let revert = ctx
        .scanner
        .revert("MED-A-001", "loc_1", 10, Some(&log_id))
        .await;
    assert!(revert.success);
    let logs = ctx.scanner.list_logs(10).await.unwrap();
    let row = logs.iter().find(|row| row.id == log_id).unwrap();
    assert!(row.reverted);
    assert!(row.reverted_at.is_some());

    let undo = ctx.scanner.undo(&log_id).await;
    assert!(!undo.success);
    assert_eq!(undo.error, Some(ScanErrorCode::AlreadyReverted));
}

#[tokio::test]
async fn revert_overwrites_regardless_of_current_value() {
    let ctx = setup("revert_overwrite").await;
    seed_med_a(&ctx, 0);

    let outcome = ctx.scanner.revert("MED-A-001", "loc_1", 5, None).await;

    assert!(outcome.success);
    assert_eq!(ctx.store.stocked_quantity("iitem_med_a", "loc_1"), Some(5));
    let product = outcome.product.unwrap();
    assert_eq!(product.previous_quantity, 0);
    assert_eq!(product.current_quantity, 5);
}

#[tokio::test]
async fn revert_survives_an_unknown_log_id() {
    let ctx = setup("revert_unknown_log").await;
    seed_med_a(&ctx, 2);

    let outcome = ctx
        .scanner
        .revert("MED-A-001", "loc_1", 7, Some("scan_0_missing"))
        .await;

    // Tagging the log row is best-effort; the overwrite still lands
    assert!(outcome.success);
    assert_eq!(ctx.store.stocked_quantity("iitem_med_a", "loc_1"), Some(7));
}

#[tokio::test]
async fn bulk_scan_processes_duplicates_in_order() {
    let ctx = setup("bulk_sequential").await;
    ctx.store.add_location("loc_1", "Main Warehouse");
    ctx.store.add_item("iitem_a", "A", Some("Item A"));
    ctx.store.add_item("iitem_b", "B", Some("Item B"));
    ctx.store.set_level("iitem_a", "loc_1", 5);
    ctx.store.set_level("iitem_b", "loc_1", 5);

    let identifiers = vec!["A".to_string(), "B".to_string(), "A".to_string()];
    let results = ctx.scanner.bulk_scan(&identifiers, "loc_1").await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));

    // The second "A" observes the quantity left by the first
    let first_a = results[0].product.as_ref().unwrap();
    let second_a = results[2].product.as_ref().unwrap();
    assert_eq!(first_a.previous_quantity, 5);
    assert_eq!(first_a.current_quantity, 4);
    assert_eq!(second_a.previous_quantity, 4);
    assert_eq!(second_a.current_quantity, 3);

    assert_eq!(ctx.store.stocked_quantity("iitem_a", "loc_1"), Some(3));
    assert_eq!(ctx.store.stocked_quantity("iitem_b", "loc_1"), Some(4));
}

#[tokio::test]
async fn bulk_scan_continues_past_failures() {
    let ctx = setup("bulk_mixed").await;
    ctx.store.add_location("loc_1", "Main Warehouse");
    ctx.store.add_item("iitem_a", "A", Some("Item A"));
    ctx.store.set_level("iitem_a", "loc_1", 1);

    let identifiers = vec!["A".to_string(), "GHOST".to_string(), "A".to_string()];
    let results = ctx.scanner.bulk_scan(&identifiers, "loc_1").await;

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(
        results[1].error,
        Some(ScanErrorCode::InventoryItemNotFound)
    );
    // Third attempt hit the zero floor
    assert!(results[2].success);
    assert_eq!(results[2].product.as_ref().unwrap().current_quantity, 0);
}

#[tokio::test]
async fn clearing_logs_leaves_nothing_to_undo() {
    let ctx = setup("clear_logs").await;
    seed_med_a(&ctx, 10);

    let scan = ctx.scanner.scan("MED-A-001", "loc_1").await;
    let log_id = scan.log_id.unwrap();
    assert_eq!(ctx.scanner.list_logs(10).await.unwrap().len(), 1);

    let deleted = ctx.scanner.clear_logs().await.unwrap();
    assert_eq!(deleted, 1);
    assert!(ctx.scanner.list_logs(10).await.unwrap().is_empty());

    let undo = ctx.scanner.undo(&log_id).await;
    assert!(!undo.success);
    assert_eq!(undo.error, Some(ScanErrorCode::LogNotFound));
}

#[tokio::test]
async fn logs_list_newest_first_and_honor_the_limit() {
    let ctx = setup("logs_ordering").await;
    seed_med_a(&ctx, 10);

    for _ in 0..3 {
        assert!(ctx.scanner.scan("MED-A-001", "loc_1").await.success);
    }

    let all = ctx.scanner.list_logs(10).await.unwrap();
    assert_eq!(all.len(), 3);
    // Newest first: quantities walk back up toward the seed value
    assert_eq!(all[0].previous_quantity, 8);
    assert_eq!(all[2].previous_quantity, 10);

    let limited = ctx.scanner.list_logs(2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, all[0].id);
}

/// Inventory store whose level lookups always fail, for exercising the
/// unexpected-error path of the scan engine.
struct BrokenLevelStore {
    inner: InMemoryInventoryStore,
}

#[async_trait]
impl InventoryStore for BrokenLevelStore {
    async fn find_items_by_sku(&self, sku: &str) -> Result<Vec<InventoryItem>, ServiceError> {
        self.inner.find_items_by_sku(sku).await
    }

    async fn find_levels(
        &self,
        _item_id: &str,
        _location_id: &str,
    ) -> Result<Vec<InventoryLevel>, ServiceError> {
        Err(ServiceError::ExternalServiceError(
            "inventory API unreachable".to_string(),
        ))
    }

    async fn set_stocked_quantity(
        &self,
        item_id: &str,
        location_id: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        self.inner
            .set_stocked_quantity(item_id, location_id, quantity)
            .await
    }

    async fn list_locations(&self) -> Result<Vec<StockLocation>, ServiceError> {
        self.inner.list_locations().await
    }
}

#[tokio::test]
async fn unexpected_store_failure_still_writes_a_failure_log() {
    let url = "sqlite:file:scan_unexpected_error?mode=memory&cache=shared";
    let db = Arc::new(establish_connection(url).await.unwrap());
    run_migrations(db.as_ref()).await.unwrap();

    let inner = InMemoryInventoryStore::new();
    inner.add_item("iitem_med_a", "MED-A-001", Some("Test Medicine A"));
    let store: Arc<dyn InventoryStore> = Arc::new(BrokenLevelStore { inner });

    let (tx, _rx) = mpsc::channel(8);
    let log_service = Arc::new(ScanLogService::new(db));
    let scanner = ScannerService::new(store, log_service, Arc::new(EventSender::new(tx)));

    let outcome = scanner.scan("MED-A-001", "loc_1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(ScanErrorCode::ScanError));
    let log_id = outcome.log_id.expect("unexpected errors must leave a log row");

    let logs = scanner.list_logs(10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].id, log_id);
    assert!(!logs[0].success);
    assert_eq!(logs[0].product_title, "Unknown");
}
