//! Stockscan API Library
//!
//! Barcode scan-and-adjust inventory workflow with a log-backed
//! undo/revert mechanism.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod inventory;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use handlers::health::HealthHandlerState;
use handlers::scanner::ScannerHandlerState;
use services::scanner::ScannerService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub scanner_service: Arc<ScannerService>,
}

impl ScannerHandlerState for AppState {
    fn scanner_service(&self) -> Arc<ScannerService> {
        self.scanner_service.clone()
    }
}

impl HealthHandlerState for AppState {
    fn db(&self) -> Arc<DatabaseConnection> {
        self.db.clone()
    }
}

// Versioned API routes
pub fn api_v1_routes() -> Router<AppState> {
    Router::new().nest(
        "/scanner",
        handlers::scanner::scanner_router::<AppState>(),
    )
}
