use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, QuerySelect, Set};
use std::sync::Arc;
use tracing::instrument;

use crate::db::DbPool;
use crate::entities::scan_log::{self, Entity as ScanLog};
use crate::errors::ServiceError;

/// Fields supplied when recording a scan attempt. Identifier and timestamps
/// are generated here, not by the caller or the database.
#[derive(Debug, Clone)]
pub struct NewScanLog {
    pub sku: String,
    pub location_id: String,
    pub location_name: String,
    pub product_title: String,
    pub previous_quantity: i32,
    pub current_quantity: i32,
    pub success: bool,
    pub message: String,
}

/// Persistence for scan log rows
pub struct ScanLogService {
    db_pool: Arc<DbPool>,
}

impl ScanLogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Inserts a new log row with a generated identifier and timestamp.
    #[instrument(skip(self, data), fields(sku = %data.sku))]
    pub async fn create(&self, data: NewScanLog) -> Result<scan_log::Model, ServiceError> {
        let now = Utc::now();
        let entry = scan_log::ActiveModel {
            id: Set(generate_log_id()),
            sku: Set(data.sku),
            location_id: Set(data.location_id),
            location_name: Set(data.location_name),
            product_title: Set(data.product_title),
            previous_quantity: Set(data.previous_quantity),
            current_quantity: Set(data.current_quantity),
            success: Set(data.success),
            message: Set(data.message),
            timestamp: Set(now),
            reverted: Set(false),
            reverted_at: Set(None),
            ..Default::default()
        };

        entry
            .insert(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Returns the most recent rows, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, limit: u64) -> Result<Vec<scan_log::Model>, ServiceError> {
        ScanLog::find()
            .order_by_desc(scan_log::Column::Timestamp)
            .limit(limit)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Flips the reverted flag and stamps the revert time. The quantity
    /// snapshot on the row is never touched.
    #[instrument(skip(self))]
    pub async fn mark_reverted(&self, id: &str) -> Result<scan_log::Model, ServiceError> {
        let row = ScanLog::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Scan log {} not found", id)))?;

        let mut active: scan_log::ActiveModel = row.into();
        active.reverted = Set(true);
        active.reverted_at = Set(Some(Utc::now()));

        active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Removes one row. Removing an already-absent row is not an error.
    #[instrument(skip(self))]
    pub async fn delete_one(&self, id: &str) -> Result<(), ServiceError> {
        ScanLog::delete_by_id(id)
            .exec(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    /// Removes every row, returning how many were deleted.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<u64, ServiceError> {
        let result = ScanLog::delete_many()
            .exec(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(result.rows_affected)
    }
}

/// Time-based prefix plus random suffix. Unique with overwhelmingly high
/// probability; collisions are not handled.
fn generate_log_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!(
        "scan_{}_{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}
