//! Statistics and dashboard handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{current_user, AppError, AppState};
use pocketmate_core::budget::{budget_usage, BudgetUsage};
use pocketmate_core::models::{
    Account, Budget, CategorySlice, ComparisonData, MonthlyStats, Transaction,
};
use pocketmate_core::stats::{
    category_chart_data, comparison, monthly_stats, six_month_trend,
};
use pocketmate_core::TrendPoint;

/// Query parameters for monthly stats
#[derive(Debug, Deserialize)]
pub struct MonthlyStatsQuery {
    /// Month as "YYYY-MM"; defaults to the current month
    pub month: Option<String>,
}

/// One month's statistics with comparison, trend, and category breakdown
#[derive(Serialize)]
pub struct MonthlyStatsResponse {
    pub month: NaiveDate,
    pub stats: MonthlyStats,
    pub comparison: ComparisonData,
    pub trend: Vec<TrendPoint>,
    pub categories: Vec<CategorySlice>,
}

/// Dashboard payload: accounts, budget usage, recent transactions
#[derive(Serialize)]
pub struct DashboardResponse {
    pub accounts: Vec<Account>,
    pub budget: Option<Budget>,
    pub budget_usage: Option<BudgetUsage>,
    pub recent_transactions: Vec<Transaction>,
}

fn parse_month(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(&format!("Invalid month (expected YYYY-MM): {}", raw)))
}

/// GET /api/stats/monthly - Statistics for one month (default: current)
pub async fn get_monthly_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthlyStatsQuery>,
    headers: HeaderMap,
) -> Result<Json<MonthlyStatsResponse>, AppError> {
    let user = current_user(&state, &headers)?;

    let month = match query.month {
        Some(raw) => parse_month(&raw)?,
        None => {
            let today = Utc::now().date_naive();
            today.with_day(1).unwrap_or(today)
        }
    };

    let stats = monthly_stats(&state.db, user.id, month)?;
    let prior_month = month.checked_sub_months(Months::new(1)).unwrap_or(month);
    let prior = monthly_stats(&state.db, user.id, prior_month)?;

    Ok(Json(MonthlyStatsResponse {
        month,
        comparison: comparison(&stats, &prior),
        trend: six_month_trend(&state.db, user.id, month)?,
        categories: category_chart_data(&stats),
        stats,
    }))
}

/// GET /api/dashboard - Everything the home view needs in one call
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    let user = current_user(&state, &headers)?;

    let accounts = state.db.list_accounts(user.id)?;
    let budget = state.db.get_budget(user.id)?;
    let usage = match &budget {
        Some(budget) => budget_usage(&state.db, budget, Utc::now())?,
        None => None,
    };
    let recent_transactions = state.db.list_transactions(user.id, None, Some(20))?;

    Ok(Json(DashboardResponse {
        accounts,
        budget,
        budget_usage: usage,
        recent_transactions,
    }))
}
