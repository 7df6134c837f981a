//! Account commands

use anyhow::{anyhow, bail, Result};
use pocketmate_core::db::Database;
use pocketmate_core::models::{currency_symbol, AccountType, User};

pub fn cmd_account_add(
    db: &Database,
    user: &User,
    name: &str,
    account_type: &str,
    balance: f64,
    default: bool,
) -> Result<()> {
    let account_type: AccountType = match account_type.parse() {
        Ok(t) => t,
        Err(e) => bail!("{}", e),
    };

    let id = db.create_account(user.id, name, account_type, balance, default)?;
    let account = db
        .get_account(id, user.id)?
        .ok_or_else(|| anyhow!("account {} missing after creation", id))?;

    let symbol = currency_symbol(&user.currency);
    println!(
        "✅ Created account {} \"{}\" ({}, balance {}{:.2}){}",
        account.id,
        account.name,
        account.account_type,
        symbol,
        account.balance,
        if account.is_default { " [default]" } else { "" }
    );

    Ok(())
}

pub fn cmd_account_list(db: &Database, user: &User) -> Result<()> {
    let accounts = db.list_accounts(user.id)?;

    if accounts.is_empty() {
        println!("No accounts yet. Create one with: pocketmate account add \"Main\"");
        return Ok(());
    }

    let symbol = currency_symbol(&user.currency);
    println!("💼 Accounts");
    println!("   {:<4} {:<20} {:<8} {:>12}  Default", "ID", "Name", "Type", "Balance");
    println!("   ────────────────────────────────────────────────────");
    for account in accounts {
        let balance = format!("{}{:.2}", symbol, account.balance);
        println!(
            "   {:<4} {:<20} {:<8} {:>12}  {}",
            account.id,
            super::truncate(&account.name, 20),
            account.account_type.to_string(),
            balance,
            if account.is_default { "✓" } else { "" }
        );
    }

    Ok(())
}

pub fn cmd_account_set_default(db: &Database, user: &User, id: i64) -> Result<()> {
    db.set_default_account(id, user.id)?;
    println!("✅ Account {} is now the default", id);
    Ok(())
}
