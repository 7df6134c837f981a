//! Budget commands

use anyhow::Result;
use chrono::Utc;

use pocketmate_core::budget::{budget_usage, ALERT_THRESHOLD_PERCENT};
use pocketmate_core::db::Database;
use pocketmate_core::models::{currency_symbol, User};

pub fn cmd_budget_set(db: &Database, user: &User, amount: f64) -> Result<()> {
    let budget = db.upsert_budget(user.id, amount)?;
    let symbol = currency_symbol(&user.currency);
    println!("✅ Monthly budget set to {}{:.2}", symbol, budget.amount);
    Ok(())
}

pub fn cmd_budget_show(db: &Database, user: &User) -> Result<()> {
    let budget = match db.get_budget(user.id)? {
        Some(budget) => budget,
        None => {
            println!("No budget set. Set one with: pocketmate budget set 1000");
            return Ok(());
        }
    };

    let symbol = currency_symbol(&user.currency);
    println!("💰 Monthly budget: {}{:.2}", symbol, budget.amount);

    match budget_usage(db, &budget, Utc::now())? {
        Some(usage) => {
            println!(
                "   Spent so far:   {}{:.2} ({:.1}%)",
                symbol, usage.total_expenses, usage.percentage_used
            );
            println!(
                "   Remaining:      {}{:.2}",
                symbol,
                (budget.amount - usage.total_expenses).max(0.0)
            );
            println!("   Account:        {}", usage.account.name);
            if usage.percentage_used >= ALERT_THRESHOLD_PERCENT {
                println!("   ⚠️  Over the {:.0}% alert threshold", ALERT_THRESHOLD_PERCENT);
            }
        }
        None => {
            println!("   No default account - usage cannot be measured.");
        }
    }

    if let Some(last) = budget.last_alert_sent {
        println!("   Last alert sent: {}", last.format("%Y-%m-%d %H:%M"));
    }

    Ok(())
}
