//! Background job scheduler
//!
//! Runs the three routines on tokio interval loops when enabled via
//! environment variables:
//!
//! - `POCKETMATE_SCHEDULE`: set to enable the scheduler ("0" disables)
//! - `POCKETMATE_RECURRING_HOURS`: recurrence scan interval (default: 24)
//! - `POCKETMATE_BUDGET_HOURS`: budget check interval (default: 6)
//!
//! Monthly reports ride a daily tick and fire only on the first of the
//! month, with the last run month tracked so a restart on the 1st cannot
//! double-send. Each unit of work is retried with exponential backoff;
//! exhausted retries are logged and skipped until the next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use tokio::time::interval;
use tracing::{error, info, warn};

use pocketmate_core::budget::run_budget_checks;
use pocketmate_core::email::Notifier;
use pocketmate_core::insights::InsightBackend;
use pocketmate_core::recurring::run_recurring_cycle;
use pocketmate_core::report::run_monthly_reports;
use pocketmate_core::Database;

use crate::RECURRING_PER_USER_LIMIT;

/// Attempts per unit of work before giving up until the next tick
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Configuration for the background scheduler
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Hours between recurrence scans
    pub recurring_interval_hours: u64,
    /// Hours between budget checks
    pub budget_interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            recurring_interval_hours: 24,
            budget_interval_hours: 6,
        }
    }
}

impl ScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None if scheduling is not configured (POCKETMATE_SCHEDULE not
    /// set, or set to "0")
    pub fn from_env() -> Option<Self> {
        let enabled = std::env::var("POCKETMATE_SCHEDULE").ok()?;
        if enabled == "0" {
            warn!("POCKETMATE_SCHEDULE is 0, background jobs disabled");
            return None;
        }

        let defaults = Self::default();
        let recurring_interval_hours = std::env::var("POCKETMATE_RECURRING_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&h| h > 0)
            .unwrap_or(defaults.recurring_interval_hours);
        let budget_interval_hours = std::env::var("POCKETMATE_BUDGET_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&h| h > 0)
            .unwrap_or(defaults.budget_interval_hours);

        Some(Self {
            recurring_interval_hours,
            budget_interval_hours,
        })
    }
}

/// Retry an operation with exponential backoff (2^attempt seconds)
///
/// Returns None when every attempt failed; the caller waits for its next
/// tick rather than retrying further.
pub(crate) async fn retry_with_backoff<T, Fut>(
    label: &str,
    mut op: impl FnMut() -> Fut,
) -> Option<T>
where
    Fut: Future<Output = pocketmate_core::Result<T>>,
{
    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        match op().await {
            Ok(value) => return Some(value),
            Err(e) if attempt == MAX_RETRY_ATTEMPTS => {
                error!(job = label, error = %e, attempts = attempt, "giving up until next tick");
            }
            Err(e) => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                warn!(job = label, error = %e, attempt, ?delay, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }
    None
}

/// Start all scheduled jobs as background tasks
///
/// The budget and report loops need the email notifier; without one they
/// are not started at all.
pub fn start_scheduler(
    db: Database,
    notifier: Option<Arc<dyn Notifier>>,
    insights: Option<Arc<dyn InsightBackend>>,
    config: ScheduleConfig,
) {
    info!(
        recurring_hours = config.recurring_interval_hours,
        budget_hours = config.budget_interval_hours,
        "starting background scheduler"
    );

    spawn_recurring_loop(db.clone(), config.recurring_interval_hours);

    match notifier {
        Some(notifier) => {
            spawn_budget_loop(db.clone(), notifier.clone(), config.budget_interval_hours);
            spawn_report_loop(db, notifier, insights);
        }
        None => {
            warn!("email notifier not configured, budget and report jobs not scheduled");
        }
    }
}

fn spawn_recurring_loop(db: Database, interval_hours: u64) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_hours * 3600));

        // Skip the first immediate tick - no job burst on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let summary = retry_with_backoff("recurring scan", || {
                run_recurring_cycle(&db, Utc::now(), RECURRING_PER_USER_LIMIT)
            })
            .await;

            if let Some(summary) = summary {
                info!(
                    scanned = summary.scanned,
                    applied = summary.applied,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "recurring cycle complete"
                );
            }
        }
    });
}

fn spawn_budget_loop(db: Database, notifier: Arc<dyn Notifier>, interval_hours: u64) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_hours * 3600));
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let summary = retry_with_backoff("budget check", || {
                run_budget_checks(&db, notifier.as_ref(), Utc::now())
            })
            .await;

            if let Some(summary) = summary {
                info!(
                    checked = summary.checked,
                    alerted = summary.alerted,
                    "budget sweep complete"
                );
            }
        }
    });
}

fn spawn_report_loop(
    db: Database,
    notifier: Arc<dyn Notifier>,
    insights: Option<Arc<dyn InsightBackend>>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(24 * 3600));
        ticker.tick().await;

        // The month the reports last went out, so a tick landing on the 1st
        // fires exactly once per month
        let mut last_run_month: Option<(i32, u32)> = None;

        loop {
            ticker.tick().await;

            let today = Utc::now().date_naive();
            let this_month = (today.year(), today.month());
            if today.day() != 1 || last_run_month == Some(this_month) {
                continue;
            }

            let summary = retry_with_backoff("monthly reports", || {
                run_monthly_reports(&db, notifier.as_ref(), insights.as_deref(), today)
            })
            .await;

            if let Some(summary) = summary {
                last_run_month = Some(this_month);
                info!(
                    users = summary.users,
                    sent = summary.sent,
                    failed = summary.failed,
                    "monthly report sweep complete"
                );
            }
        }
    });
}
