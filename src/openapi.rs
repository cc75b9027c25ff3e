use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockscan API",
        description = r#"
Barcode scan-and-adjust inventory API.

Each scan decrements one unit of a SKU at a stock location and records the
attempt in an audit log. Every scan can be compensated: `revert` restores an
explicit quantity and tags the log row, `undo` restores the pre-scan quantity
recorded in a log row and deletes the row.
"#,
        contact(name = "Stockscan", email = "support@stockscan.dev")
    ),
    paths(
        crate::handlers::scanner::scan,
        crate::handlers::scanner::bulk_scan,
        crate::handlers::scanner::revert,
        crate::handlers::scanner::undo,
        crate::handlers::scanner::list_logs,
        crate::handlers::scanner::clear_logs,
    ),
    components(schemas(
        crate::handlers::scanner::ScanRequest,
        crate::handlers::scanner::BulkScanRequest,
        crate::handlers::scanner::RevertRequest,
        crate::handlers::scanner::UndoRequest,
        crate::handlers::scanner::BulkScanResponse,
        crate::handlers::scanner::ScanLogsResponse,
        crate::handlers::scanner::ClearLogsResponse,
        crate::services::scanner::ScanOutcome,
        crate::services::scanner::ScannedProduct,
        crate::services::scanner::ScanErrorCode,
        crate::entities::scan_log::Model,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "scanner", description = "Scan, bulk scan, revert, undo, and scan log management")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
