//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Pocket Mate - Track accounts, transactions, and budgets
#[derive(Parser)]
#[command(name = "pocketmate")]
#[command(about = "Self-hosted personal finance tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "pocketmate.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set POCKETMATE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Acting user's email (the user row is created on first use)
    #[arg(long, default_value = "local@pocketmate.local", global = true)]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Manage transactions
    Tx {
        #[command(subcommand)]
        action: TxAction,
    },

    /// Manage the monthly budget
    Budget {
        #[command(subcommand)]
        action: BudgetAction,
    },

    /// Run a background job by hand
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Show monthly statistics
    Stats {
        /// Month as YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountAction {
    /// Create an account
    Add {
        /// Account name
        name: String,

        /// Account type: current, savings, credit, loan
        #[arg(long = "type", default_value = "current")]
        account_type: String,

        /// Opening balance
        #[arg(long, default_value_t = 0.0)]
        balance: f64,

        /// Make this the default account
        #[arg(long)]
        default: bool,
    },

    /// List accounts
    List,

    /// Make an account the default
    SetDefault {
        /// Account id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum TxAction {
    /// Record a transaction
    Add {
        /// Account id
        #[arg(long)]
        account: i64,

        /// Transaction type: income or expense
        #[arg(long = "type", default_value = "expense")]
        tx_type: String,

        /// Amount (must be positive)
        #[arg(long)]
        amount: f64,

        /// Date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Description
        #[arg(long)]
        description: String,

        /// Category
        #[arg(long, default_value = "other")]
        category: String,

        /// Make this a recurring definition: daily, weekly, monthly, yearly
        #[arg(long)]
        recurring: Option<String>,
    },

    /// List transactions, newest first
    List {
        /// Only this account
        #[arg(long)]
        account: Option<i64>,

        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum BudgetAction {
    /// Set the monthly budget amount
    Set {
        /// Budget amount (must be positive)
        amount: f64,
    },

    /// Show the budget and current-month usage
    Show,
}

#[derive(Subcommand)]
pub enum JobsAction {
    /// Scan and apply due recurring transactions
    Recurring,

    /// Check budgets and send threshold alerts
    Budgets,

    /// Compile and send monthly reports
    Reports,
}
