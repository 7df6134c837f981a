//! Budget monitor
//!
//! Watches every budget against the current month's spending on the owner's
//! default account and fires at most one alert per budget per calendar month.
//! The month-comparison guard on `last_alert_sent` makes repeated sweeps
//! within a month idempotent; a new calendar month re-arms the alert.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::db::Database;
use crate::email::Notifier;
use crate::error::Result;
use crate::models::{currency_symbol, Account, Budget, TransactionType, User};

/// Spend percentage at which an alert fires. Fixed policy, not per-user.
pub const ALERT_THRESHOLD_PERCENT: f64 = 80.0;

/// Totals for one monitor sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BudgetRunSummary {
    pub checked: usize,
    pub alerted: usize,
    /// Budgets with no default account, or under threshold, or already alerted
    pub skipped: usize,
    pub failed: usize,
}

/// Current-month consumption of a budget, for the dashboard and alert body
#[derive(Debug, Clone, Serialize)]
pub struct BudgetUsage {
    pub budget: Budget,
    pub account: Account,
    pub total_expenses: f64,
    pub percentage_used: f64,
}

/// True when two timestamps fall in different calendar months
pub fn is_new_month(last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    last.month() != now.month() || last.year() != now.year()
}

pub fn percentage_used(total_expenses: f64, budget_amount: f64) -> f64 {
    if budget_amount > 0.0 {
        total_expenses / budget_amount * 100.0
    } else {
        0.0
    }
}

/// Compute a budget's current-month usage against the default account
///
/// Returns None when the user has no default account - such a budget cannot
/// be evaluated and the monitor skips it.
pub fn budget_usage(
    db: &Database,
    budget: &Budget,
    now: DateTime<Utc>,
) -> Result<Option<BudgetUsage>> {
    let account = match db.get_default_account(budget.user_id)? {
        Some(account) => account,
        None => return Ok(None),
    };

    let first_of_month = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    let total_expenses = db.sum_transactions(
        budget.user_id,
        Some(account.id),
        TransactionType::Expense,
        first_of_month,
        None,
        None,
    )?;

    Ok(Some(BudgetUsage {
        budget: budget.clone(),
        account,
        total_expenses,
        percentage_used: percentage_used(total_expenses, budget.amount),
    }))
}

fn render_alert(user: &User, usage: &BudgetUsage) -> (String, String) {
    let symbol = currency_symbol(&user.currency);
    let subject = format!("Budget Alert for {}", usage.account.name);
    let body = format!(
        "Hi {},\n\n\
         You've used {:.1}% of your monthly budget.\n\n\
         Budget amount: {}{:.2}\n\
         Spent so far:  {}{:.2}\n\
         Remaining:     {}{:.2}\n\
         Account:       {}\n\n\
         - Pocket Mate",
        user.name.as_deref().unwrap_or("there"),
        usage.percentage_used,
        symbol,
        usage.budget.amount,
        symbol,
        usage.total_expenses,
        symbol,
        (usage.budget.amount - usage.total_expenses).max(0.0),
        usage.account.name,
    );
    (subject, body)
}

/// Evaluate one budget; returns true when an alert was sent
pub async fn check_budget(
    db: &Database,
    notifier: &dyn Notifier,
    budget: &Budget,
    now: DateTime<Utc>,
) -> Result<bool> {
    let usage = match budget_usage(db, budget, now)? {
        Some(usage) => usage,
        None => {
            debug!(budget_id = budget.id, "no default account, skipping budget");
            return Ok(false);
        }
    };

    let already_alerted_this_month = budget
        .last_alert_sent
        .map(|last| !is_new_month(last, now))
        .unwrap_or(false);

    if usage.percentage_used < ALERT_THRESHOLD_PERCENT || already_alerted_this_month {
        return Ok(false);
    }

    let user = db.get_user(budget.user_id)?;
    let (subject, body) = render_alert(&user, &usage);
    notifier.send(&user.email, &subject, &body).await?;
    db.mark_budget_alert_sent(budget.id, now)?;

    info!(
        budget_id = budget.id,
        user_id = budget.user_id,
        percentage_used = format!("{:.1}", usage.percentage_used),
        "budget alert sent"
    );
    Ok(true)
}

/// Sweep every budget; one record's failure never aborts the rest
pub async fn run_budget_checks(
    db: &Database,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Result<BudgetRunSummary> {
    let budgets = db.list_budgets()?;
    let mut summary = BudgetRunSummary {
        checked: budgets.len(),
        ..Default::default()
    };

    for budget in &budgets {
        match check_budget(db, notifier, budget, now).await {
            Ok(true) => summary.alerted += 1,
            Ok(false) => summary.skipped += 1,
            Err(e) => {
                error!(budget_id = budget.id, error = %e, "budget check failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
