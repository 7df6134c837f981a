//! Pocket Mate CLI - Personal finance tracker
//!
//! Usage:
//!   pocketmate init                     Initialize database
//!   pocketmate account add "Main"       Create an account
//!   pocketmate tx add --account 1 --amount 9.99 --description "Coffee"
//!   pocketmate serve --port 3000        Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve { port, host } => {
            commands::cmd_serve(&cli.db, &host, port, cli.no_encrypt).await
        }
        Commands::Account { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let user = commands::resolve_user(&db, &cli.user)?;
            match action {
                AccountAction::Add {
                    name,
                    account_type,
                    balance,
                    default,
                } => commands::cmd_account_add(&db, &user, &name, &account_type, balance, default),
                AccountAction::List => commands::cmd_account_list(&db, &user),
                AccountAction::SetDefault { id } => {
                    commands::cmd_account_set_default(&db, &user, id)
                }
            }
        }
        Commands::Tx { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let user = commands::resolve_user(&db, &cli.user)?;
            match action {
                TxAction::Add {
                    account,
                    tx_type,
                    amount,
                    date,
                    description,
                    category,
                    recurring,
                } => commands::cmd_tx_add(
                    &db,
                    &user,
                    account,
                    &tx_type,
                    amount,
                    date,
                    &description,
                    &category,
                    recurring.as_deref(),
                ),
                TxAction::List { account, limit } => {
                    commands::cmd_tx_list(&db, &user, account, limit)
                }
            }
        }
        Commands::Budget { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let user = commands::resolve_user(&db, &cli.user)?;
            match action {
                BudgetAction::Set { amount } => commands::cmd_budget_set(&db, &user, amount),
                BudgetAction::Show => commands::cmd_budget_show(&db, &user),
            }
        }
        Commands::Jobs { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                JobsAction::Recurring => commands::cmd_jobs_recurring(&db).await,
                JobsAction::Budgets => commands::cmd_jobs_budgets(&db).await,
                JobsAction::Reports => commands::cmd_jobs_reports(&db).await,
            }
        }
        Commands::Stats { month } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let user = commands::resolve_user(&db, &cli.user)?;
            commands::cmd_stats(&db, &user, month.as_deref())
        }
    }
}
