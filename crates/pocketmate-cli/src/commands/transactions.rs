//! Transaction commands

use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, Utc};

use pocketmate_core::db::{Database, TransactionFields};
use pocketmate_core::models::{
    currency_symbol, RecurringInterval, TransactionStatus, TransactionType, User,
};

#[allow(clippy::too_many_arguments)]
pub fn cmd_tx_add(
    db: &Database,
    user: &User,
    account_id: i64,
    tx_type: &str,
    amount: f64,
    date: Option<NaiveDate>,
    description: &str,
    category: &str,
    recurring: Option<&str>,
) -> Result<()> {
    let tx_type: TransactionType = match tx_type.parse() {
        Ok(t) => t,
        Err(e) => bail!("{}", e),
    };
    let recurring_interval: Option<RecurringInterval> = match recurring {
        Some(raw) => match raw.parse() {
            Ok(interval) => Some(interval),
            Err(e) => bail!("{}", e),
        },
        None => None,
    };

    let fields = TransactionFields {
        account_id,
        tx_type,
        amount,
        date: date.unwrap_or_else(|| Utc::now().date_naive()),
        description: description.to_string(),
        category: category.to_string(),
        is_recurring: recurring_interval.is_some(),
        recurring_interval,
        status: TransactionStatus::Completed,
    };

    let transaction = db.create_transaction(user.id, &fields)?;
    let account = db
        .get_account(account_id, user.id)?
        .ok_or_else(|| anyhow!("account {} missing after posting", account_id))?;

    let symbol = currency_symbol(&user.currency);
    println!(
        "✅ Recorded {} {}{:.2} \"{}\" on {}",
        transaction.tx_type, symbol, transaction.amount, transaction.description, transaction.date
    );
    if let (Some(interval), Some(next)) =
        (fields.recurring_interval, transaction.next_recurring_date)
    {
        println!("   🔁 Recurs {}, next on {}", interval, next);
    }
    println!("   Account balance: {}{:.2}", symbol, account.balance);

    Ok(())
}

pub fn cmd_tx_list(db: &Database, user: &User, account_id: Option<i64>, limit: i64) -> Result<()> {
    let transactions = db.list_transactions(user.id, account_id, Some(limit))?;

    if transactions.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    let symbol = currency_symbol(&user.currency);
    println!("📒 Transactions (newest first)");
    println!(
        "   {:<4} {:<10} {:<7} {:>12} {:<15} Description",
        "ID", "Date", "Type", "Amount", "Category"
    );
    println!("   ──────────────────────────────────────────────────────────────");
    for t in transactions {
        let amount = format!("{}{:.2}", symbol, t.amount);
        let marker = if t.is_recurring { " 🔁" } else { "" };
        println!(
            "   {:<4} {:<10} {:<7} {:>12} {:<15} {}{}",
            t.id,
            t.date.to_string(),
            t.tx_type.to_string(),
            amount,
            super::truncate(&t.category, 15),
            super::truncate(&t.description, 30),
            marker
        );
    }

    Ok(())
}
