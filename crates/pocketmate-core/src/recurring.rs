//! Recurrence engine
//!
//! Turns each recurring transaction definition into exactly one posted ledger
//! entry per elapsed interval. Two phases:
//!
//! - **Scan** (`Database::find_due_recurring`): pure read selecting every
//!   definition whose next occurrence has arrived, fanned out as one task per
//!   definition.
//! - **Apply** (`apply_occurrence`): posts one occurrence inside a single SQL
//!   transaction - occurrence insert, balance increment, and schedule advance
//!   commit together or not at all. A due-ness re-check at the top makes
//!   retries no-ops, so at-least-once task delivery cannot double-post.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use rusqlite::params;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{RecurringInterval, Transaction};

/// Suffix appended to auto-generated occurrence descriptions
pub const OCCURRENCE_SUFFIX: &str = " (Recurring)";

/// Compute the next occurrence date after `date` for an interval
///
/// Monthly and yearly use calendar arithmetic with end-of-month clamping:
/// Jan 31 + 1 month is Feb 29 in a leap year, Feb 28 otherwise.
pub fn next_recurring_date(date: NaiveDate, interval: RecurringInterval) -> NaiveDate {
    let next = match interval {
        RecurringInterval::Daily => date.checked_add_days(Days::new(1)),
        RecurringInterval::Weekly => date.checked_add_days(Days::new(7)),
        RecurringInterval::Monthly => date.checked_add_months(Months::new(1)),
        RecurringInterval::Yearly => date.checked_add_months(Months::new(12)),
    };
    // Out of range only at the far end of chrono's date range
    next.unwrap_or(date)
}

/// One unit of Phase B work: a due definition and its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurringTask {
    pub transaction_id: i64,
    pub user_id: i64,
}

/// Phase A: scan for due definitions and fan them out as per-item tasks
///
/// Pure read with no ledger side effects; safe to re-run on failure.
pub fn scan_due_tasks(db: &Database, now: DateTime<Utc>) -> Result<Vec<RecurringTask>> {
    let due = db.find_due_recurring(now.date_naive())?;
    Ok(due
        .iter()
        .map(|definition| RecurringTask {
            transaction_id: definition.id,
            user_id: definition.user_id,
        })
        .collect())
}

/// Outcome of a single apply attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// An occurrence was posted and the schedule advanced
    Applied,
    /// The definition was no longer due (already processed by an earlier
    /// retry, or edited since the scan)
    NotDue,
    /// The definition no longer exists for this user
    Missing,
}

/// Totals for one scan-and-apply cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecurringRunSummary {
    /// Definitions the scan found due
    pub scanned: usize,
    pub applied: usize,
    /// No-ops: stale tasks or definitions deferred by the per-user cap
    pub skipped: usize,
    pub failed: usize,
}

fn is_due(definition: &Transaction, today: NaiveDate) -> bool {
    if definition.last_processed.is_none() {
        return true;
    }
    match definition.next_recurring_date {
        Some(next) => next <= today,
        // Processed before but no schedule recorded: treat as due so the
        // apply step can repair the schedule
        None => true,
    }
}

/// Post one occurrence of a recurring definition, exactly once per period
///
/// All mutations run in one SQL transaction against the store. Safe to retry:
/// the due-ness re-check turns a second delivery of the same task into
/// `NotDue`.
pub fn apply_occurrence(
    db: &Database,
    transaction_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<ApplyOutcome> {
    let mut conn = db.conn()?;
    let tx = conn.transaction()?;

    // Re-fetch: the scan result may be stale by the time the task runs
    let definition = match tx.query_row(
        &format!(
            "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
            crate::db::TRANSACTION_COLUMNS
        ),
        params![transaction_id, user_id],
        crate::db::row_to_transaction,
    ) {
        Ok(t) => t,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(ApplyOutcome::Missing),
        Err(e) => return Err(e.into()),
    };

    let today = now.date_naive();
    if !definition.is_recurring || !is_due(&definition, today) {
        return Ok(ApplyOutcome::NotDue);
    }

    // A recurring row without an interval is a data-inconsistency: leave the
    // row untouched for an operator rather than guessing a schedule
    let interval = definition.recurring_interval.ok_or_else(|| {
        Error::InvalidData(format!(
            "recurring transaction {} has no interval",
            definition.id
        ))
    })?;

    // 1. Post the occurrence as a fresh, non-recurring ledger entry
    tx.execute(
        r#"
        INSERT INTO transactions
            (user_id, account_id, tx_type, amount, date, description, category,
             is_recurring, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, FALSE, 'completed')
        "#,
        params![
            definition.user_id,
            definition.account_id,
            definition.tx_type.as_str(),
            definition.amount,
            today.to_string(),
            format!("{}{}", definition.description, OCCURRENCE_SUFFIX),
            definition.category,
        ],
    )?;

    // 2. Apply the balance effect as a single-statement increment
    tx.execute(
        "UPDATE accounts SET balance = balance + ? WHERE id = ?",
        params![
            definition.tx_type.balance_sign() * definition.amount,
            definition.account_id
        ],
    )?;

    // 3. Advance the definition's schedule
    Database::advance_recurring_schedule(
        &tx,
        definition.id,
        now,
        next_recurring_date(today, interval),
    )?;

    tx.commit()?;

    debug!(
        transaction_id = definition.id,
        user_id = definition.user_id,
        "posted recurring occurrence"
    );
    Ok(ApplyOutcome::Applied)
}

/// Run one full scan-and-apply cycle
///
/// Tasks are grouped by user: different users run in parallel, one user's
/// tasks run sequentially (serializing balance updates on that user's
/// accounts) and at most `per_user_limit` of them per cycle. Anything
/// deferred by the cap is still due and is picked up by the next scan.
/// A failing task is logged and skipped; it never aborts the cycle.
pub async fn run_recurring_cycle(
    db: &Database,
    now: DateTime<Utc>,
    per_user_limit: usize,
) -> Result<RecurringRunSummary> {
    let tasks = scan_due_tasks(db, now)?;

    let mut by_user: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for task in &tasks {
        by_user
            .entry(task.user_id)
            .or_default()
            .push(task.transaction_id);
    }

    let mut summary = RecurringRunSummary {
        scanned: tasks.len(),
        ..Default::default()
    };

    let mut handles = Vec::with_capacity(by_user.len());
    for (user_id, transaction_ids) in by_user {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let mut applied = 0usize;
            let mut skipped = 0usize;
            let mut failed = 0usize;

            let deferred = transaction_ids.len().saturating_sub(per_user_limit);
            for transaction_id in transaction_ids.into_iter().take(per_user_limit) {
                match apply_occurrence(&db, transaction_id, user_id, now) {
                    Ok(ApplyOutcome::Applied) => applied += 1,
                    Ok(ApplyOutcome::NotDue) | Ok(ApplyOutcome::Missing) => skipped += 1,
                    Err(e) => {
                        error!(
                            transaction_id,
                            user_id,
                            error = %e,
                            "failed to apply recurring occurrence"
                        );
                        failed += 1;
                    }
                }
            }
            (applied, skipped + deferred, failed)
        }));
    }

    for handle in handles {
        match handle.await {
            Ok((applied, skipped, failed)) => {
                summary.applied += applied;
                summary.skipped += skipped;
                summary.failed += failed;
            }
            Err(e) => {
                warn!(error = %e, "recurring worker task panicked");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionFields;
    use crate::models::{AccountType, TransactionStatus, TransactionType};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_date_daily_weekly() {
        assert_eq!(
            next_recurring_date(ymd(2024, 3, 15), RecurringInterval::Daily),
            ymd(2024, 3, 16)
        );
        assert_eq!(
            next_recurring_date(ymd(2024, 3, 15), RecurringInterval::Weekly),
            ymd(2024, 3, 22)
        );
    }

    #[test]
    fn test_next_date_monthly_clamps_to_month_end() {
        // Leap year: Jan 31 -> Feb 29
        assert_eq!(
            next_recurring_date(ymd(2024, 1, 31), RecurringInterval::Monthly),
            ymd(2024, 2, 29)
        );
        // Non-leap: Jan 31 -> Feb 28
        assert_eq!(
            next_recurring_date(ymd(2023, 1, 31), RecurringInterval::Monthly),
            ymd(2023, 2, 28)
        );
        // Mid-month dates are unaffected
        assert_eq!(
            next_recurring_date(ymd(2024, 4, 15), RecurringInterval::Monthly),
            ymd(2024, 5, 15)
        );
    }

    #[test]
    fn test_next_date_yearly() {
        assert_eq!(
            next_recurring_date(ymd(2024, 1, 1), RecurringInterval::Yearly),
            ymd(2025, 1, 1)
        );
        // Feb 29 clamps to Feb 28 in the following year
        assert_eq!(
            next_recurring_date(ymd(2024, 2, 29), RecurringInterval::Yearly),
            ymd(2025, 2, 28)
        );
    }

    fn setup_user_account(db: &Database, opening_balance: f64) -> (i64, i64) {
        let user = db.upsert_user("auth_rec", "rec@example.com", Some("Rec")).unwrap();
        let account_id = db
            .create_account(user.id, "Savings", AccountType::Savings, opening_balance, true)
            .unwrap();
        (user.id, account_id)
    }

    fn recurring_expense(account_id: i64, amount: f64) -> TransactionFields {
        TransactionFields {
            account_id,
            tx_type: TransactionType::Expense,
            amount,
            date: Utc::now().date_naive(),
            description: "Netflix".to_string(),
            category: "subscriptions".to_string(),
            is_recurring: true,
            recurring_interval: Some(RecurringInterval::Monthly),
            status: TransactionStatus::Completed,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_cycle_posts_once() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = setup_user_account(&db, 1050.0);

        // Creating the definition itself posts -50
        let definition = db
            .create_transaction(user_id, &recurring_expense(account_id, 50.0))
            .unwrap();
        assert_eq!(
            db.get_account(account_id, user_id).unwrap().unwrap().balance,
            1000.0
        );

        // Never processed, so the definition is due immediately
        let now = Utc::now();
        let summary = run_recurring_cycle(&db, now, 10).await.unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 0);

        let account = db.get_account(account_id, user_id).unwrap().unwrap();
        assert_eq!(account.balance, 950.0);

        // Exactly one occurrence exists, non-recurring, suffixed
        let transactions = db.list_transactions(user_id, None, None).unwrap();
        let occurrences: Vec<_> = transactions
            .iter()
            .filter(|t| !t.is_recurring && t.description.ends_with(OCCURRENCE_SUFFIX))
            .collect();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].amount, 50.0);
        assert_eq!(occurrences[0].tx_type, TransactionType::Expense);

        // Schedule advanced by one calendar month
        let updated = db.get_transaction(definition.id, user_id).unwrap().unwrap();
        assert!(updated.last_processed.is_some());
        assert_eq!(
            updated.next_recurring_date,
            Some(next_recurring_date(now.date_naive(), RecurringInterval::Monthly))
        );

        // Running the pipeline again the same day changes nothing
        let summary = run_recurring_cycle(&db, now, 10).await.unwrap();
        assert_eq!(summary.applied, 0);
        assert_eq!(
            db.get_account(account_id, user_id).unwrap().unwrap().balance,
            950.0
        );
    }

    #[test]
    fn test_apply_occurrence_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = setup_user_account(&db, 500.0);
        let definition = db
            .create_transaction(user_id, &recurring_expense(account_id, 25.0))
            .unwrap();
        let now = Utc::now();

        // First delivery posts, retry of the same task no-ops
        assert_eq!(
            apply_occurrence(&db, definition.id, user_id, now).unwrap(),
            ApplyOutcome::Applied
        );
        assert_eq!(
            apply_occurrence(&db, definition.id, user_id, now).unwrap(),
            ApplyOutcome::NotDue
        );

        let account = db.get_account(account_id, user_id).unwrap().unwrap();
        assert_eq!(account.balance, 500.0 - 25.0 - 25.0);

        let posted = db
            .list_transactions(user_id, None, None)
            .unwrap()
            .into_iter()
            .filter(|t| !t.is_recurring)
            .count();
        assert_eq!(posted, 1);
    }

    #[test]
    fn test_apply_missing_definition() {
        let db = Database::in_memory().unwrap();
        let (user_id, _) = setup_user_account(&db, 0.0);
        assert_eq!(
            apply_occurrence(&db, 9999, user_id, Utc::now()).unwrap(),
            ApplyOutcome::Missing
        );
    }

    #[tokio::test]
    async fn test_balance_conservation_across_mixed_definitions() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = setup_user_account(&db, 1000.0);

        let mut fields = recurring_expense(account_id, 30.0);
        db.create_transaction(user_id, &fields).unwrap();

        fields = recurring_expense(account_id, 45.0);
        fields.description = "Gym".to_string();
        db.create_transaction(user_id, &fields).unwrap();

        fields = recurring_expense(account_id, 200.0);
        fields.tx_type = TransactionType::Income;
        fields.description = "Stipend".to_string();
        fields.category = "salary".to_string();
        db.create_transaction(user_id, &fields).unwrap();

        // After creation: 1000 - 30 - 45 + 200
        let after_create = 1125.0;
        assert_eq!(
            db.get_account(account_id, user_id).unwrap().unwrap().balance,
            after_create
        );

        let summary = run_recurring_cycle(&db, Utc::now(), 10).await.unwrap();
        assert_eq!(summary.applied, 3);

        // Each definition posts once more: B + sum(income) - sum(expense)
        let account = db.get_account(account_id, user_id).unwrap().unwrap();
        assert_eq!(account.balance, after_create + 200.0 - 30.0 - 45.0);
    }

    #[tokio::test]
    async fn test_per_user_cap_defers_excess_tasks() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = setup_user_account(&db, 1000.0);

        for i in 0..5 {
            let mut fields = recurring_expense(account_id, 10.0);
            fields.description = format!("Sub {}", i);
            db.create_transaction(user_id, &fields).unwrap();
        }

        let summary = run_recurring_cycle(&db, Utc::now(), 2).await.unwrap();
        assert_eq!(summary.scanned, 5);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 3);

        // The deferred definitions are still due for the next cycle
        let summary = run_recurring_cycle(&db, Utc::now(), 10).await.unwrap();
        assert_eq!(summary.applied, 3);
    }

    #[test]
    fn test_malformed_definition_is_surfaced_and_untouched() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = setup_user_account(&db, 100.0);
        let definition = db
            .create_transaction(user_id, &recurring_expense(account_id, 10.0))
            .unwrap();

        // Corrupt the interval out from under the engine
        let conn = db.conn().unwrap();
        conn.execute(
            "UPDATE transactions SET recurring_interval = NULL WHERE id = ?",
            rusqlite::params![definition.id],
        )
        .unwrap();

        let err = apply_occurrence(&db, definition.id, user_id, Utc::now());
        assert!(matches!(err, Err(Error::InvalidData(_))));

        // Nothing posted, balance untouched
        assert_eq!(
            db.get_account(account_id, user_id).unwrap().unwrap().balance,
            90.0
        );
        let posted = db
            .list_transactions(user_id, None, None)
            .unwrap()
            .into_iter()
            .filter(|t| !t.is_recurring)
            .count();
        assert_eq!(posted, 0);
    }
}
