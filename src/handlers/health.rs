use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

/// Trait for health handler state that provides access to the database
pub trait HealthHandlerState: Clone + Send + Sync + 'static {
    fn db(&self) -> Arc<DatabaseConnection>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: &'static str,
    pub timestamp: String,
    pub database: ComponentStatus,
}

pub fn health_router<S>() -> Router<S>
where
    S: HealthHandlerState,
{
    Router::new().route("/health", get(health_check::<S>))
}

/// Readiness probe: reports overall status and a database ping.
async fn health_check<S>(State(state): State<S>) -> impl IntoResponse
where
    S: HealthHandlerState,
{
    let database = match state.db().ping().await {
        Ok(()) => ComponentStatus::Up,
        Err(_) => ComponentStatus::Down,
    };

    let (status, code) = match database {
        ComponentStatus::Up => (ComponentStatus::Up, StatusCode::OK),
        ComponentStatus::Down => (ComponentStatus::Down, StatusCode::SERVICE_UNAVAILABLE),
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now().to_rfc3339(),
            database,
        }),
    )
}
