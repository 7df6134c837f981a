//! Monthly aggregation and trend helpers
//!
//! Pure computations over fetched ledger rows: nothing here is persisted.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    CategorySlice, ComparisonData, MonthlyStats, TransactionType, TrendPoint,
};

/// First and last day of the calendar month containing `month`
pub fn month_bounds(month: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = month.with_day(1).unwrap_or(month);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(first);
    (first, last)
}

/// Short and full labels for a month, e.g. ("Mar", "March")
pub fn month_labels(month: NaiveDate) -> (String, String) {
    (
        month.format("%b").to_string(),
        month.format("%B").to_string(),
    )
}

/// Aggregate one user's ledger over the calendar month containing `month`
///
/// Income and expenses are totalled separately; `by_category` covers expenses
/// only. The savings rate is zero-guarded: no income means 0, not NaN.
pub fn monthly_stats(db: &Database, user_id: i64, month: NaiveDate) -> Result<MonthlyStats> {
    let (first, last) = month_bounds(month);
    let transactions = db.list_transactions_in_range(user_id, first, last)?;

    let mut stats = MonthlyStats {
        transaction_count: transactions.len(),
        ..Default::default()
    };

    for t in &transactions {
        match t.tx_type {
            TransactionType::Expense => {
                stats.total_expenses += t.amount;
                *stats.by_category.entry(t.category.clone()).or_insert(0.0) += t.amount;
            }
            TransactionType::Income => stats.total_income += t.amount,
        }
    }

    stats.net_income = stats.total_income - stats.total_expenses;
    stats.savings_rate = if stats.total_income > 0.0 {
        stats.net_income / stats.total_income * 100.0
    } else {
        0.0
    };
    stats.top_category = stats
        .by_category
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(category, _)| category.clone())
        .unwrap_or_else(|| "None".to_string());
    stats.category_count = stats.by_category.len();

    Ok(stats)
}

/// Month-over-month deltas, percent deltas zero-guarded against empty priors
pub fn comparison(current: &MonthlyStats, previous: &MonthlyStats) -> ComparisonData {
    let percent = |delta: f64, base: f64| if base > 0.0 { delta / base * 100.0 } else { 0.0 };

    let income_change = current.total_income - previous.total_income;
    let expense_change = current.total_expenses - previous.total_expenses;

    ComparisonData {
        income_change,
        expense_change,
        savings_change: current.net_income - previous.net_income,
        income_change_percent: percent(income_change, previous.total_income),
        expense_change_percent: percent(expense_change, previous.total_expenses),
    }
}

/// Six-month trend ending at the month of `end`, oldest first
pub fn six_month_trend(db: &Database, user_id: i64, end: NaiveDate) -> Result<Vec<TrendPoint>> {
    let mut trend = Vec::with_capacity(6);

    for back in (0..6).rev() {
        let month = end
            .checked_sub_months(Months::new(back))
            .unwrap_or(end);
        let stats = monthly_stats(db, user_id, month)?;
        let (short, full) = month_labels(month);
        trend.push(TrendPoint {
            month: short,
            full_month: full,
            income: stats.total_income,
            expenses: stats.total_expenses,
            savings: stats.net_income,
            transaction_count: stats.transaction_count,
        });
    }

    Ok(trend)
}

/// Expense categories sorted descending by amount, with their share of the
/// month's expenses. Derived for rendering only.
pub fn category_chart_data(stats: &MonthlyStats) -> Vec<CategorySlice> {
    let mut slices: Vec<CategorySlice> = stats
        .by_category
        .iter()
        .map(|(category, amount)| CategorySlice {
            category: category.clone(),
            amount: *amount,
            percentage: if stats.total_expenses > 0.0 {
                amount / stats.total_expenses * 100.0
            } else {
                0.0
            },
        })
        .collect();
    slices.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionFields;
    use crate::models::{AccountType, TransactionStatus};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed(db: &Database) -> (i64, i64) {
        let user = db
            .upsert_user("auth_stats", "stats@example.com", None)
            .unwrap();
        let account_id = db
            .create_account(user.id, "Main", AccountType::Current, 0.0, true)
            .unwrap();
        (user.id, account_id)
    }

    fn entry(
        account_id: i64,
        tx_type: TransactionType,
        amount: f64,
        date: NaiveDate,
        category: &str,
    ) -> TransactionFields {
        TransactionFields {
            account_id,
            tx_type,
            amount,
            date,
            description: String::new(),
            category: category.to_string(),
            is_recurring: false,
            recurring_interval: None,
            status: TransactionStatus::Completed,
        }
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            month_bounds(ymd(2024, 2, 15)),
            (ymd(2024, 2, 1), ymd(2024, 2, 29))
        );
        assert_eq!(
            month_bounds(ymd(2023, 12, 31)),
            (ymd(2023, 12, 1), ymd(2023, 12, 31))
        );
    }

    #[test]
    fn test_category_aggregation() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = seed(&db);
        let month = ymd(2024, 5, 1);

        for (tx_type, amount, category) in [
            (TransactionType::Expense, 100.0, "food"),
            (TransactionType::Expense, 50.0, "food"),
            (TransactionType::Expense, 30.0, "transportation"),
            (TransactionType::Income, 500.0, "salary"),
        ] {
            db.create_transaction(
                user_id,
                &entry(account_id, tx_type, amount, ymd(2024, 5, 10), category),
            )
            .unwrap();
        }

        let stats = monthly_stats(&db, user_id, month).unwrap();
        assert_eq!(stats.total_expenses, 180.0);
        assert_eq!(stats.total_income, 500.0);
        assert_eq!(stats.net_income, 320.0);
        assert_eq!(stats.savings_rate, 64.0);
        assert_eq!(stats.by_category.get("food"), Some(&150.0));
        assert_eq!(stats.by_category.get("transportation"), Some(&30.0));
        assert_eq!(stats.top_category, "food");
        assert_eq!(stats.category_count, 2);
        assert_eq!(stats.transaction_count, 4);
    }

    #[test]
    fn test_savings_rate_zero_guard() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = seed(&db);

        db.create_transaction(
            user_id,
            &entry(
                account_id,
                TransactionType::Expense,
                500.0,
                ymd(2024, 6, 3),
                "housing",
            ),
        )
        .unwrap();

        let stats = monthly_stats(&db, user_id, ymd(2024, 6, 1)).unwrap();
        assert_eq!(stats.total_income, 0.0);
        assert_eq!(stats.net_income, -500.0);
        assert_eq!(stats.savings_rate, 0.0);
        assert!(stats.savings_rate.is_finite());
    }

    #[test]
    fn test_empty_month_has_none_top_category() {
        let db = Database::in_memory().unwrap();
        let (user_id, _) = seed(&db);
        let stats = monthly_stats(&db, user_id, ymd(2024, 1, 1)).unwrap();
        assert_eq!(stats.top_category, "None");
        assert_eq!(stats.category_count, 0);
        assert_eq!(stats.transaction_count, 0);
    }

    #[test]
    fn test_comparison_zero_guards() {
        let previous = MonthlyStats::default();
        let current = MonthlyStats {
            total_income: 100.0,
            total_expenses: 40.0,
            net_income: 60.0,
            ..Default::default()
        };

        let c = comparison(&current, &previous);
        assert_eq!(c.income_change, 100.0);
        assert_eq!(c.expense_change, 40.0);
        assert_eq!(c.savings_change, 60.0);
        // Prior period empty: percent deltas collapse to 0 rather than inf
        assert_eq!(c.income_change_percent, 0.0);
        assert_eq!(c.expense_change_percent, 0.0);
    }

    #[test]
    fn test_comparison_percentages() {
        let previous = MonthlyStats {
            total_income: 200.0,
            total_expenses: 100.0,
            net_income: 100.0,
            ..Default::default()
        };
        let current = MonthlyStats {
            total_income: 300.0,
            total_expenses: 150.0,
            net_income: 150.0,
            ..Default::default()
        };

        let c = comparison(&current, &previous);
        assert_eq!(c.income_change_percent, 50.0);
        assert_eq!(c.expense_change_percent, 50.0);
        assert_eq!(c.savings_change, 50.0);
    }

    #[test]
    fn test_trend_is_six_months_oldest_first() {
        let db = Database::in_memory().unwrap();
        let (user_id, account_id) = seed(&db);

        // One expense in the final month only
        db.create_transaction(
            user_id,
            &entry(
                account_id,
                TransactionType::Expense,
                75.0,
                ymd(2024, 6, 15),
                "food",
            ),
        )
        .unwrap();

        let trend = six_month_trend(&db, user_id, ymd(2024, 6, 1)).unwrap();
        assert_eq!(trend.len(), 6);
        assert_eq!(trend[0].month, "Jan");
        assert_eq!(trend[5].month, "Jun");
        assert_eq!(trend[5].full_month, "June");
        assert_eq!(trend[5].expenses, 75.0);
        assert!(trend[..5].iter().all(|p| p.expenses == 0.0));
    }

    #[test]
    fn test_chart_data_sorted_with_percentages() {
        let mut stats = MonthlyStats::default();
        stats.total_expenses = 200.0;
        stats.by_category.insert("food".to_string(), 150.0);
        stats.by_category.insert("transportation".to_string(), 50.0);

        let slices = category_chart_data(&stats);
        assert_eq!(slices[0].category, "food");
        assert_eq!(slices[0].percentage, 75.0);
        assert_eq!(slices[1].percentage, 25.0);

        // No expenses: percentages are zero, not NaN
        let empty = MonthlyStats {
            by_category: stats.by_category.clone(),
            total_expenses: 0.0,
            ..Default::default()
        };
        assert!(category_chart_data(&empty)
            .iter()
            .all(|s| s.percentage == 0.0));
    }
}
