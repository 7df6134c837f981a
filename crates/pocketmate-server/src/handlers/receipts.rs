//! Receipt scanning handler
//!
//! Accepts a base64-encoded image, hands it to the insight backend, and
//! returns the extracted transaction fields for a pre-filled entry form.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use base64::Engine;
use serde::Deserialize;

use crate::{current_user, AppError, AppState, MAX_UPLOAD_SIZE};
use pocketmate_core::models::ParsedReceipt;

/// Request body for scanning a receipt
#[derive(Debug, Deserialize)]
pub struct ScanReceiptRequest {
    /// Base64-encoded image bytes
    pub image: String,
    /// e.g. "image/jpeg"
    pub mime_type: String,
}

/// POST /api/receipts/scan - Extract transaction fields from a receipt image
pub async fn scan_receipt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ScanReceiptRequest>,
) -> Result<Json<ParsedReceipt>, AppError> {
    current_user(&state, &headers)?;

    let backend = state
        .insights
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Receipt scanning requires an AI backend"))?;

    let image = base64::engine::general_purpose::STANDARD
        .decode(&req.image)
        .map_err(|_| AppError::bad_request("Invalid base64 image data"))?;

    if image.is_empty() {
        return Err(AppError::bad_request("Empty image"));
    }
    if image.len() > MAX_UPLOAD_SIZE {
        return Err(AppError::bad_request("Image too large (max 10 MB)"));
    }

    let parsed = backend.parse_receipt(&image, &req.mime_type).await?;
    Ok(Json(parsed))
}
