//! Pocket Mate Core Library
//!
//! Shared functionality for the Pocket Mate personal finance tracker:
//! - Database access and migrations (users, accounts, transactions, budgets)
//! - Recurrence engine for recurring transactions
//! - Budget monitor with once-per-month alerting
//! - Monthly report compiler (stats, trends, comparisons)
//! - Email notifier client with a mock for tests
//! - Generative-AI insight backend with a static fallback

pub mod budget;
pub mod db;
pub mod email;
pub mod error;
pub mod insights;
pub mod models;
pub mod recurring;
pub mod report;
pub mod stats;

pub use budget::{BudgetRunSummary, BudgetUsage, ALERT_THRESHOLD_PERCENT};
pub use db::{Database, TransactionFields};
pub use email::{EmailClient, MockNotifier, Notifier, SentEmail};
pub use error::{Error, Result};
pub use insights::{fallback_insights, GeminiClient, InsightBackend, MockInsights};
pub use models::{
    currency_symbol, Account, AccountType, Budget, CategorySlice, ComparisonData,
    MonthlyStats, ParsedReceipt, RecurringInterval, Transaction, TransactionStatus,
    TransactionType, TrendPoint, User,
};
pub use recurring::{
    apply_occurrence, next_recurring_date, run_recurring_cycle, scan_due_tasks,
    ApplyOutcome, RecurringRunSummary, RecurringTask,
};
pub use report::{
    compile_report, generate_report, render_report, run_monthly_reports, MonthlyReport,
    ReportRunSummary,
};
pub use stats::{category_chart_data, comparison, monthly_stats, six_month_trend};
