//! Operator endpoints for the three background routines
//!
//! These call the same idempotent core routines the scheduler runs, so an
//! operator can trigger or re-run a cycle by hand. Re-running is safe: the
//! recurrence engine re-checks due-ness, the budget monitor is guarded by
//! `last_alert_sent`, and reports go out per sweep.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use tracing::info;

use crate::{current_user, AppError, AppState, RECURRING_PER_USER_LIMIT};
use pocketmate_core::budget::{run_budget_checks, BudgetRunSummary};
use pocketmate_core::recurring::{run_recurring_cycle, RecurringRunSummary};
use pocketmate_core::report::{run_monthly_reports, ReportRunSummary};

/// POST /api/jobs/recurring - Run one recurrence scan-and-apply cycle
pub async fn run_recurring_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RecurringRunSummary>, AppError> {
    let user = current_user(&state, &headers)?;

    let summary = run_recurring_cycle(&state.db, Utc::now(), RECURRING_PER_USER_LIMIT).await?;
    info!(
        triggered_by = user.id,
        scanned = summary.scanned,
        applied = summary.applied,
        "manual recurring cycle"
    );
    Ok(Json(summary))
}

/// POST /api/jobs/budgets - Run one budget monitor sweep
pub async fn run_budget_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BudgetRunSummary>, AppError> {
    let user = current_user(&state, &headers)?;

    let notifier = state
        .notifier
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Budget alerts require an email notifier"))?;

    let summary = run_budget_checks(&state.db, notifier.as_ref(), Utc::now()).await?;
    info!(
        triggered_by = user.id,
        checked = summary.checked,
        alerted = summary.alerted,
        "manual budget sweep"
    );
    Ok(Json(summary))
}

/// POST /api/jobs/reports - Generate and send monthly reports for all users
pub async fn run_report_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ReportRunSummary>, AppError> {
    let user = current_user(&state, &headers)?;

    let notifier = state
        .notifier
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Monthly reports require an email notifier"))?;

    let summary = run_monthly_reports(
        &state.db,
        notifier.as_ref(),
        state.insights.as_deref(),
        Utc::now().date_naive(),
    )
    .await?;
    info!(
        triggered_by = user.id,
        users = summary.users,
        sent = summary.sent,
        "manual report sweep"
    );
    Ok(Json(summary))
}
