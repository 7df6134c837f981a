//! Budget handlers
//!
//! One budget per user. The amount is editable; the once-per-month alert
//! guard (`last_alert_sent`) is owned by the budget monitor and survives
//! amount edits.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{current_user, AppError, AppState};
use pocketmate_core::budget::budget_usage;
use pocketmate_core::models::Budget;

/// Request body for setting the budget amount
#[derive(Debug, Deserialize)]
pub struct UpsertBudgetRequest {
    pub amount: f64,
}

/// The budget together with its current-month consumption
#[derive(Serialize)]
pub struct BudgetResponse {
    pub budget: Budget,
    /// None when the user has no default account to measure against
    pub current_expenses: Option<f64>,
    pub percentage_used: Option<f64>,
}

fn with_usage(state: &AppState, budget: Budget) -> Result<BudgetResponse, AppError> {
    let usage = budget_usage(&state.db, &budget, Utc::now())?;
    Ok(BudgetResponse {
        current_expenses: usage.as_ref().map(|u| u.total_expenses),
        percentage_used: usage.as_ref().map(|u| u.percentage_used),
        budget,
    })
}

/// GET /api/budget - The caller's budget and current usage
pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BudgetResponse>, AppError> {
    let user = current_user(&state, &headers)?;

    let budget = state
        .db
        .get_budget(user.id)?
        .ok_or_else(|| AppError::not_found("No budget set"))?;

    Ok(Json(with_usage(&state, budget)?))
}

/// PUT /api/budget - Create or update the budget amount
pub async fn upsert_budget(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpsertBudgetRequest>,
) -> Result<Json<BudgetResponse>, AppError> {
    let user = current_user(&state, &headers)?;
    let budget = state.db.upsert_budget(user.id, req.amount)?;
    Ok(Json(with_usage(&state, budget)?))
}
