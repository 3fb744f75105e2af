use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppResult;
use crate::handlers::AppState;

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let ocr_configured = !state.config.ocr_api_key.is_empty();
    let settings = state.identity.settings();

    let status = if ocr_configured { "healthy" } else { "degraded" };

    let response = json!({
        "status": status,
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "ocr_backend": state.identity.ocr_backend(),
            "ocr_configured": ocr_configured
        },
        "limits": {
            "max_image_bytes": settings.max_image_bytes,
            "max_upload_size_mb": state.config.max_upload_size_mb
        }
    });

    info!(status = status, ocr_configured = ocr_configured, "Health check completed");

    Ok(Json(response))
}
