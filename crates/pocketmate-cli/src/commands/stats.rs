//! Monthly statistics command

use anyhow::{bail, Result};
use chrono::{Datelike, Months, NaiveDate, Utc};

use pocketmate_core::db::Database;
use pocketmate_core::models::{currency_symbol, User};
use pocketmate_core::stats::{
    category_chart_data, comparison, month_labels, monthly_stats, six_month_trend,
};

pub fn cmd_stats(db: &Database, user: &User, month: Option<&str>) -> Result<()> {
    let month = match month {
        Some(raw) => match NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => bail!("Invalid month (expected YYYY-MM): {}", raw),
        },
        None => {
            let today = Utc::now().date_naive();
            today.with_day(1).unwrap_or(today)
        }
    };

    let stats = monthly_stats(db, user.id, month)?;
    let prior_month = month.checked_sub_months(Months::new(1)).unwrap_or(month);
    let prior = monthly_stats(db, user.id, prior_month)?;
    let change = comparison(&stats, &prior);
    let (_, month_label) = month_labels(month);
    let symbol = currency_symbol(&user.currency);

    println!("📊 {} {}", month_label, month.year());
    println!("   ─────────────────────────────");
    println!("   Income:       {}{:.2}", symbol, stats.total_income);
    println!("   Expenses:     {}{:.2}", symbol, stats.total_expenses);
    println!("   Net:          {}{:.2}", symbol, stats.net_income);
    println!("   Savings rate: {:.1}%", stats.savings_rate);
    println!("   Transactions: {}", stats.transaction_count);
    println!(
        "   vs last month: income {:+.1}%, expenses {:+.1}%",
        change.income_change_percent, change.expense_change_percent
    );

    let categories = category_chart_data(&stats);
    if !categories.is_empty() {
        println!();
        println!("   Top spending ({} categories):", stats.category_count);
        for slice in categories.iter().take(5) {
            println!(
                "     {:<15} {}{:.2} ({:.1}%)",
                super::truncate(&slice.category, 15),
                symbol,
                slice.amount,
                slice.percentage
            );
        }
    }

    let trend = six_month_trend(db, user.id, month)?;
    println!();
    println!("   6-month trend (income / expenses):");
    for point in trend {
        println!(
            "     {:<4} {}{:.2} / {}{:.2}",
            point.month, symbol, point.income, symbol, point.expenses
        );
    }

    Ok(())
}
