use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::entities::scan_log;
use crate::services::scanner::{ScanErrorCode, ScanOutcome, ScannerService};

const DEFAULT_LOGS_LIMIT: u64 = 100;

/// Trait for scanner handler state that provides access to the scanner service
pub trait ScannerHandlerState: Clone + Send + Sync + 'static {
    fn scanner_service(&self) -> Arc<ScannerService>;
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScanRequest {
    pub sku: Option<String>,
    pub location_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkScanRequest {
    pub identifiers: Option<Vec<String>>,
    pub location_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevertRequest {
    pub sku: Option<String>,
    pub location_id: Option<String>,
    /// Quantity to restore; zero is a valid value, so presence is what is
    /// validated, not truthiness.
    pub previous_quantity: Option<i32>,
    pub log_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UndoRequest {
    pub log_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct LogsQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkScanResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<ScanOutcome>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScanLogsResponse {
    pub success: bool,
    pub logs: Vec<scan_log::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearLogsResponse {
    pub success: bool,
    pub message: String,
}

/// Create the scanner router
pub fn scanner_router<S>() -> Router<S>
where
    S: ScannerHandlerState,
{
    Router::new()
        .route("/", post(scan::<S>))
        .route("/bulk", post(bulk_scan::<S>))
        .route("/revert", post(revert::<S>))
        .route("/undo", post(undo::<S>))
        .route("/logs", get(list_logs::<S>).delete(clear_logs::<S>))
}

fn reject(message: &str, code: ScanErrorCode) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ScanOutcome::failure(message, code)),
    )
        .into_response()
}

fn outcome_response(outcome: ScanOutcome) -> Response {
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, Json(outcome)).into_response()
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Scan one unit of a SKU at a location
#[utoipa::path(
    post,
    path = "/api/v1/scanner",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan succeeded", body = ScanOutcome),
        (status = 400, description = "Missing sku or location id", body = ScanOutcome),
        (status = 404, description = "Item or level not found", body = ScanOutcome),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "scanner"
)]
pub async fn scan<S>(State(state): State<S>, Json(payload): Json<ScanRequest>) -> Response
where
    S: ScannerHandlerState,
{
    let Some(sku) = present(payload.sku) else {
        return reject("SKU is required", ScanErrorCode::MissingSku);
    };
    let Some(location_id) = present(payload.location_id) else {
        return reject("Location ID is required", ScanErrorCode::MissingLocationId);
    };

    let outcome = state.scanner_service().scan(&sku, &location_id).await;
    outcome_response(outcome)
}

/// Scan a batch of identifiers sequentially at one location
#[utoipa::path(
    post,
    path = "/api/v1/scanner/bulk",
    request_body = BulkScanRequest,
    responses(
        (status = 200, description = "Batch processed; per-item outcomes inside", body = BulkScanResponse),
        (status = 400, description = "Missing identifiers or location id", body = ScanOutcome),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "scanner"
)]
pub async fn bulk_scan<S>(State(state): State<S>, Json(payload): Json<BulkScanRequest>) -> Response
where
    S: ScannerHandlerState,
{
    let Some(identifiers) = payload.identifiers.filter(|ids| !ids.is_empty()) else {
        return reject(
            "Identifiers array is required",
            ScanErrorCode::MissingIdentifiers,
        );
    };
    let Some(location_id) = present(payload.location_id) else {
        return reject("Location ID is required", ScanErrorCode::MissingLocationId);
    };

    let results = state
        .scanner_service()
        .bulk_scan(&identifiers, &location_id)
        .await;

    (
        StatusCode::OK,
        Json(BulkScanResponse {
            success: true,
            message: format!("Processed {} identifiers", identifiers.len()),
            results,
        }),
    )
        .into_response()
}

/// Restore inventory to an explicit quantity, optionally tagging a log row
#[utoipa::path(
    post,
    path = "/api/v1/scanner/revert",
    request_body = RevertRequest,
    responses(
        (status = 200, description = "Inventory restored", body = ScanOutcome),
        (status = 400, description = "Missing field", body = ScanOutcome),
        (status = 404, description = "Item or level not found", body = ScanOutcome),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "scanner"
)]
pub async fn revert<S>(State(state): State<S>, Json(payload): Json<RevertRequest>) -> Response
where
    S: ScannerHandlerState,
{
    let Some(sku) = present(payload.sku) else {
        return reject("SKU is required", ScanErrorCode::MissingSku);
    };
    let Some(location_id) = present(payload.location_id) else {
        return reject("Location ID is required", ScanErrorCode::MissingLocationId);
    };
    let Some(previous_quantity) = payload.previous_quantity else {
        return reject(
            "Previous quantity is required",
            ScanErrorCode::MissingPreviousQuantity,
        );
    };

    let outcome = state
        .scanner_service()
        .revert(
            &sku,
            &location_id,
            previous_quantity,
            payload.log_id.as_deref(),
        )
        .await;
    outcome_response(outcome)
}

/// Reverse a recorded scan and erase its log row
#[utoipa::path(
    post,
    path = "/api/v1/scanner/undo",
    request_body = UndoRequest,
    responses(
        (status = 200, description = "Scan undone and log row removed", body = ScanOutcome),
        (status = 400, description = "Missing log id", body = ScanOutcome),
        (status = 404, description = "Log row not found or already reverted", body = ScanOutcome),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "scanner"
)]
pub async fn undo<S>(State(state): State<S>, Json(payload): Json<UndoRequest>) -> Response
where
    S: ScannerHandlerState,
{
    let Some(log_id) = present(payload.log_id) else {
        return reject("Log ID is required", ScanErrorCode::MissingLogId);
    };

    let outcome = state.scanner_service().undo(&log_id).await;
    outcome_response(outcome)
}

/// List the most recent scan log rows
#[utoipa::path(
    get,
    path = "/api/v1/scanner/logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Scan logs returned, newest first", body = ScanLogsResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "scanner"
)]
pub async fn list_logs<S>(State(state): State<S>, Query(query): Query<LogsQuery>) -> Response
where
    S: ScannerHandlerState,
{
    let limit = query.limit.unwrap_or(DEFAULT_LOGS_LIMIT);
    match state.scanner_service().list_logs(limit).await {
        Ok(logs) => (
            StatusCode::OK,
            Json(ScanLogsResponse {
                success: true,
                logs,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Delete every scan log row
#[utoipa::path(
    delete,
    path = "/api/v1/scanner/logs",
    responses(
        (status = 200, description = "All scan logs cleared", body = ClearLogsResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "scanner"
)]
pub async fn clear_logs<S>(State(state): State<S>) -> Response
where
    S: ScannerHandlerState,
{
    match state.scanner_service().clear_logs().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ClearLogsResponse {
                success: true,
                message: "All scan logs cleared successfully".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
