//! Domain models for Pocket Mate

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user profile, provisioned from the external identity provider on first sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// External identity-provider id
    pub auth_id: String,
    pub email: String,
    pub name: Option<String>,
    /// Preferred currency code, display-only (no conversion)
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// A named money container owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub account_type: AccountType,
    /// Signed balance; mutated only through transaction application
    pub balance: f64,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Current,
    Savings,
    Credit,
    Loan,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Loan => "loan",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "current" | "checking" => Ok(Self::Current),
            "savings" => Ok(Self::Savings),
            "credit" => Ok(Self::Credit),
            "loan" => Ok(Self::Loan),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Sign applied to the account balance when this entry posts
    pub fn balance_sign(&self) -> f64 {
        match self {
            Self::Income => 1.0,
            Self::Expense => -1.0,
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interval between occurrences of a recurring transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringInterval {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurringInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for RecurringInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown recurring interval: {}", s)),
        }
    }
}

impl std::fmt::Display for RecurringInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single ledger entry
///
/// A recurring definition is itself a transaction row: it carries the interval
/// and the scheduling state (`last_processed`, `next_recurring_date`), and each
/// elapsed interval posts a fresh non-recurring copy of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub tx_type: TransactionType,
    /// Always positive; direction comes from `tx_type`
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub is_recurring: bool,
    /// Present iff `is_recurring` (enforced at the create/update boundary)
    pub recurring_interval: Option<RecurringInterval>,
    pub next_recurring_date: Option<NaiveDate>,
    pub last_processed: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// A per-user monthly spending ceiling, evaluated against the default account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub last_alert_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate statistics for one calendar month; derived, never persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_income: f64,
    /// Percent of income kept; 0 when there was no income
    pub savings_rate: f64,
    /// Expense totals keyed by category
    pub by_category: HashMap<String, f64>,
    pub transaction_count: usize,
    /// Category with the largest expense total, or "None"
    pub top_category: String,
    pub category_count: usize,
}

/// Month-over-month deltas between two stat windows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonData {
    pub income_change: f64,
    pub expense_change: f64,
    pub savings_change: f64,
    /// Percent deltas are 0 when the prior period's value was 0
    pub income_change_percent: f64,
    pub expense_change_percent: f64,
}

/// One month of the 6-month trend series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Short label, e.g. "Mar"
    pub month: String,
    /// Full label, e.g. "March"
    pub full_month: String,
    pub income: f64,
    pub expenses: f64,
    pub savings: f64,
    pub transaction_count: usize,
}

/// One expense category's share of the month, for chart rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySlice {
    pub category: String,
    pub amount: f64,
    /// Share of total expenses; 0 when the month had no expenses
    pub percentage: f64,
}

/// Fields extracted from a scanned receipt image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedReceipt {
    pub amount: f64,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub merchant_name: Option<String>,
    pub category: Option<String>,
}

/// Map a currency code to its display symbol
///
/// Display-only: the application never converts amounts between currencies.
pub fn currency_symbol(code: &str) -> &'static str {
    match code {
        "INR" => "₹",
        "EUR" => "€",
        "GBP" => "£",
        _ => "$",
    }
}
