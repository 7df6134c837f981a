//! Transaction handlers
//!
//! All balance-affecting writes go through the core database layer, which
//! pairs the ledger change with the balance change atomically.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{current_user, AppError, AppState, SuccessResponse};
use pocketmate_core::db::TransactionFields;
use pocketmate_core::models::{
    RecurringInterval, Transaction, TransactionStatus, TransactionType,
};

/// Request body for creating or editing a transaction
#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub account_id: i64,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_interval: Option<RecurringInterval>,
    #[serde(default)]
    pub status: TransactionStatus,
}

impl TransactionRequest {
    fn into_fields(self) -> TransactionFields {
        TransactionFields {
            account_id: self.account_id,
            tx_type: self.tx_type,
            amount: self.amount,
            date: self.date,
            description: self.description,
            category: self.category,
            is_recurring: self.is_recurring,
            recurring_interval: self.recurring_interval,
            status: self.status,
        }
    }
}

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub account_id: Option<i64>,
    pub tx_type: Option<TransactionType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// GET /api/transactions - List the caller's transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTransactionsQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let user = current_user(&state, &headers)?;

    let mut transactions = state
        .db
        .list_transactions(user.id, query.account_id, query.limit)?;

    // Post-filters that don't merit their own SQL paths
    if let Some(tx_type) = query.tx_type {
        transactions.retain(|t| t.tx_type == tx_type);
    }
    if let Some(from) = query.from {
        transactions.retain(|t| t.date >= from);
    }
    if let Some(to) = query.to {
        transactions.retain(|t| t.date <= to);
    }

    Ok(Json(transactions))
}

/// POST /api/transactions - Create a transaction (updates the account balance)
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TransactionRequest>,
) -> Result<Json<Transaction>, AppError> {
    let user = current_user(&state, &headers)?;
    let transaction = state.db.create_transaction(user.id, &req.into_fields())?;
    Ok(Json(transaction))
}

/// GET /api/transactions/:id - A single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Transaction>, AppError> {
    let user = current_user(&state, &headers)?;

    let transaction = state
        .db
        .get_transaction(id, user.id)?
        .ok_or_else(|| AppError::not_found(&format!("Transaction {} not found", id)))?;

    Ok(Json(transaction))
}

/// PUT /api/transactions/:id - Edit a transaction (balance moves by the delta)
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<TransactionRequest>,
) -> Result<Json<Transaction>, AppError> {
    let user = current_user(&state, &headers)?;
    let transaction = state.db.update_transaction(id, user.id, &req.into_fields())?;
    Ok(Json(transaction))
}

/// DELETE /api/transactions/:id - Delete a transaction (reverses its balance effect)
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = current_user(&state, &headers)?;
    state.db.delete_transaction(id, user.id)?;
    Ok(Json(SuccessResponse { success: true }))
}
