//! Account management handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{current_user, AppError, AppState, SuccessResponse};
use pocketmate_core::models::{Account, AccountType, Transaction};

/// Request body for creating an account
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub is_default: bool,
}

/// An account together with its recent transactions
#[derive(Serialize)]
pub struct AccountDetail {
    #[serde(flatten)]
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

/// GET /api/accounts - List the caller's accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Account>>, AppError> {
    let user = current_user(&state, &headers)?;
    let accounts = state.db.list_accounts(user.id)?;
    Ok(Json(accounts))
}

/// POST /api/accounts - Create a new account
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<Account>, AppError> {
    let user = current_user(&state, &headers)?;

    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Account name is required"));
    }

    let account_id = state.db.create_account(
        user.id,
        req.name.trim(),
        req.account_type,
        req.balance,
        req.is_default,
    )?;

    let account = state
        .db
        .get_account(account_id, user.id)?
        .ok_or_else(|| AppError::not_found("Account not found after creation"))?;

    Ok(Json(account))
}

/// GET /api/accounts/:id - An account with its transactions
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<AccountDetail>, AppError> {
    let user = current_user(&state, &headers)?;

    let account = state
        .db
        .get_account(id, user.id)?
        .ok_or_else(|| AppError::not_found(&format!("Account {} not found", id)))?;
    let transactions = state.db.list_transactions(user.id, Some(id), None)?;

    Ok(Json(AccountDetail {
        account,
        transactions,
    }))
}

/// POST /api/accounts/:id/default - Make this the default account
pub async fn set_default_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = current_user(&state, &headers)?;
    state.db.set_default_account(id, user.id)?;
    Ok(Json(SuccessResponse { success: true }))
}
