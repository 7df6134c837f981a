//! Manual triggers for the three background routines
//!
//! Each command runs the same idempotent routine the server scheduler runs,
//! so a cycle can be triggered or re-run from a shell or cron job.

use anyhow::{bail, Result};
use chrono::Utc;

use pocketmate_core::budget::run_budget_checks;
use pocketmate_core::db::Database;
use pocketmate_core::email::EmailClient;
use pocketmate_core::insights::{GeminiClient, InsightBackend};
use pocketmate_core::recurring::run_recurring_cycle;
use pocketmate_core::report::run_monthly_reports;

/// Per-user cap per cycle, matching the server scheduler
const PER_USER_LIMIT: usize = 10;

pub async fn cmd_jobs_recurring(db: &Database) -> Result<()> {
    println!("🔁 Running recurrence scan...");

    let summary = run_recurring_cycle(db, Utc::now(), PER_USER_LIMIT).await?;

    println!("   Definitions due: {}", summary.scanned);
    println!("   Applied:         {}", summary.applied);
    println!("   Skipped:         {}", summary.skipped);
    if summary.failed > 0 {
        println!("   ⚠️  Failed:       {}", summary.failed);
    }

    Ok(())
}

pub async fn cmd_jobs_budgets(db: &Database) -> Result<()> {
    let Some(notifier) = EmailClient::from_env() else {
        bail!("Budget alerts need an email notifier. Set POCKETMATE_EMAIL_API_KEY.");
    };

    println!("💰 Running budget checks...");

    let summary = run_budget_checks(db, &notifier, Utc::now()).await?;

    println!("   Budgets checked: {}", summary.checked);
    println!("   Alerts sent:     {}", summary.alerted);
    println!("   Skipped:         {}", summary.skipped);
    if summary.failed > 0 {
        println!("   ⚠️  Failed:       {}", summary.failed);
    }

    Ok(())
}

pub async fn cmd_jobs_reports(db: &Database) -> Result<()> {
    let Some(notifier) = EmailClient::from_env() else {
        bail!("Monthly reports need an email notifier. Set POCKETMATE_EMAIL_API_KEY.");
    };

    let insights = GeminiClient::from_env();
    if insights.is_none() {
        println!("   💡 Tip: Set GEMINI_API_KEY for AI insights (using fallback list)");
    }

    println!("📊 Generating monthly reports...");

    let summary = run_monthly_reports(
        db,
        &notifier,
        insights.as_ref().map(|c| c as &dyn InsightBackend),
        Utc::now().date_naive(),
    )
    .await?;

    println!("   Users:        {}", summary.users);
    println!("   Reports sent: {}", summary.sent);
    if summary.failed > 0 {
        println!("   ⚠️  Failed:    {}", summary.failed);
    }

    Ok(())
}
