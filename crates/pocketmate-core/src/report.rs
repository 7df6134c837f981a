//! Monthly report compiler
//!
//! Once per calendar month, for every user: last month's statistics, a
//! month-over-month comparison, a 6-month trend, narrative insights (AI with
//! a static fallback), rendered into one plain-text email.

use chrono::{Months, NaiveDate};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::email::Notifier;
use crate::error::Result;
use crate::insights::{fallback_insights, InsightBackend};
use crate::models::{
    currency_symbol, CategorySlice, ComparisonData, MonthlyStats, TrendPoint, User,
};
use crate::stats::{
    category_chart_data, comparison, month_labels, monthly_stats, six_month_trend,
};

/// Everything a report email is rendered from; computed, never stored
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    /// First day of the month being reported on
    pub month: NaiveDate,
    pub month_label: String,
    pub stats: MonthlyStats,
    pub comparison: ComparisonData,
    pub trend: Vec<TrendPoint>,
    pub categories: Vec<CategorySlice>,
    pub insights: Vec<String>,
    /// True when the insight backend failed and the static list was used
    pub used_fallback: bool,
}

/// Totals for one report sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportRunSummary {
    pub users: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Compile a user's report for the month before `as_of`
pub async fn compile_report(
    db: &Database,
    insight_backend: Option<&dyn InsightBackend>,
    user: &User,
    as_of: NaiveDate,
) -> Result<MonthlyReport> {
    let report_month = as_of
        .checked_sub_months(Months::new(1))
        .unwrap_or(as_of);
    let prior_month = report_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(report_month);

    let stats = monthly_stats(db, user.id, report_month)?;
    let prior = monthly_stats(db, user.id, prior_month)?;
    let trend = six_month_trend(db, user.id, report_month)?;
    let categories = category_chart_data(&stats);
    let (_, month_label) = month_labels(report_month);

    // Any backend failure or malformed response degrades to the fixed list;
    // a flaky model must never block the report
    let (insights, used_fallback) = match insight_backend {
        Some(backend) => match backend.generate_insights(&stats, &month_label).await {
            Ok(insights) => (insights, false),
            Err(e) => {
                warn!(user_id = user.id, error = %e, "insight generation failed, using fallback");
                (fallback_insights(), true)
            }
        },
        None => (fallback_insights(), true),
    };

    Ok(MonthlyReport {
        month: report_month,
        month_label,
        comparison: comparison(&stats, &prior),
        stats,
        trend,
        categories,
        insights,
        used_fallback,
    })
}

fn change_line(label: &str, change: f64, percent: f64, symbol: &str) -> String {
    let direction = if change >= 0.0 { "up" } else { "down" };
    if percent != 0.0 {
        format!(
            "  {}: {} {}{:.2} ({:.1}%)",
            label,
            direction,
            symbol,
            change.abs(),
            percent.abs()
        )
    } else {
        format!("  {}: {} {}{:.2}", label, direction, symbol, change.abs())
    }
}

/// Render a report into a subject and plain-text body
pub fn render_report(user: &User, report: &MonthlyReport) -> (String, String) {
    let symbol = currency_symbol(&user.currency);
    let subject = format!("Your Monthly Financial Report - {}", report.month_label);

    let mut body = format!(
        "Hi {},\n\nHere's your financial summary for {}:\n\n\
         Total Income:   {}{:.2}\n\
         Total Expenses: {}{:.2}\n\
         Net Income:     {}{:.2}\n\
         Savings Rate:   {:.1}%\n\
         Transactions:   {}\n",
        user.name.as_deref().unwrap_or("there"),
        report.month_label,
        symbol,
        report.stats.total_income,
        symbol,
        report.stats.total_expenses,
        symbol,
        report.stats.net_income,
        report.stats.savings_rate,
        report.stats.transaction_count,
    );

    body.push_str("\nCompared to the previous month:\n");
    body.push_str(&change_line(
        "Income",
        report.comparison.income_change,
        report.comparison.income_change_percent,
        symbol,
    ));
    body.push('\n');
    body.push_str(&change_line(
        "Expenses",
        report.comparison.expense_change,
        report.comparison.expense_change_percent,
        symbol,
    ));
    body.push('\n');
    body.push_str(&change_line(
        "Savings",
        report.comparison.savings_change,
        0.0,
        symbol,
    ));
    body.push('\n');

    if !report.categories.is_empty() {
        body.push_str("\nSpending by category:\n");
        for slice in &report.categories {
            body.push_str(&format!(
                "  {:<16} {}{:.2} ({:.1}%)\n",
                slice.category, symbol, slice.amount, slice.percentage
            ));
        }
    }

    body.push_str("\nSix-month trend (income / expenses / savings):\n");
    for point in &report.trend {
        body.push_str(&format!(
            "  {:<4} {}{:.2} / {}{:.2} / {}{:.2}\n",
            point.month, symbol, point.income, symbol, point.expenses, symbol, point.savings
        ));
    }

    body.push_str("\nInsights:\n");
    for insight in &report.insights {
        body.push_str(&format!("  - {}\n", insight));
    }

    body.push_str("\n- Pocket Mate");
    (subject, body)
}

/// Compile, render, and dispatch one user's report
pub async fn generate_report(
    db: &Database,
    notifier: &dyn Notifier,
    insight_backend: Option<&dyn InsightBackend>,
    user: &User,
    as_of: NaiveDate,
) -> Result<()> {
    let report = compile_report(db, insight_backend, user, as_of).await?;
    let (subject, body) = render_report(user, &report);
    notifier.send(&user.email, &subject, &body).await?;

    info!(
        user_id = user.id,
        month = %report.month_label,
        used_fallback = report.used_fallback,
        "monthly report sent"
    );
    Ok(())
}

/// Generate reports for every user; per-user isolation on failure
pub async fn run_monthly_reports(
    db: &Database,
    notifier: &dyn Notifier,
    insight_backend: Option<&dyn InsightBackend>,
    as_of: NaiveDate,
) -> Result<ReportRunSummary> {
    let users = db.list_users()?;
    let mut summary = ReportRunSummary {
        users: users.len(),
        ..Default::default()
    };

    for user in &users {
        match generate_report(db, notifier, insight_backend, user, as_of).await {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                error!(user_id = user.id, error = %e, "monthly report failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
