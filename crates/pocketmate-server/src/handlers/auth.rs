//! Identity and liveness handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use crate::{current_user, AppError, AppState, SuccessResponse};
use pocketmate_core::models::User;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /api/health - liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /api/me - the caller's user row, provisioned on first sight
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let user = current_user(&state, &headers)?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct UpdateCurrencyRequest {
    pub currency: String,
}

#[derive(Serialize)]
pub struct CurrencyResponse {
    pub currency: String,
}

/// GET /api/me/currency - the caller's preferred display currency
pub async fn get_currency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CurrencyResponse>, AppError> {
    let user = current_user(&state, &headers)?;
    Ok(Json(CurrencyResponse {
        currency: user.currency,
    }))
}

/// PUT /api/me/currency - set the preferred display currency
pub async fn update_currency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateCurrencyRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = current_user(&state, &headers)?;

    let code = req.currency.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::bad_request("Currency must be a 3-letter code"));
    }

    state
        .db
        .update_user_currency(user.id, &code.to_ascii_uppercase())?;

    Ok(Json(SuccessResponse { success: true }))
}
