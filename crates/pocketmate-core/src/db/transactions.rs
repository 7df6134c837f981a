//! Transaction operations
//!
//! Every balance-affecting write (create, edit, delete) pairs the ledger row
//! change with the account balance change inside one SQL transaction, so a
//! crash can never leave the balance and the history disagreeing.

use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    RecurringInterval, Transaction, TransactionStatus, TransactionType,
};
use crate::recurring::next_recurring_date;

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, account_id, tx_type, amount, date, \
     description, category, is_recurring, recurring_interval, next_recurring_date, \
     last_processed, status, created_at";

pub(crate) fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let type_str: String = row.get(3)?;
    let date_str: String = row.get(5)?;
    let interval_str: Option<String> = row.get(9)?;
    let next_date_str: Option<String> = row.get(10)?;
    let last_processed_str: Option<String> = row.get(11)?;
    let status_str: String = row.get(12)?;
    let created_at_str: String = row.get(13)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_id: row.get(2)?,
        tx_type: TransactionType::from_str(&type_str)
            .unwrap_or(TransactionType::Expense),
        amount: row.get(4)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .unwrap_or_default(),
        description: row.get(6)?,
        category: row.get(7)?,
        is_recurring: row.get(8)?,
        recurring_interval: interval_str
            .and_then(|s| RecurringInterval::from_str(&s).ok()),
        next_recurring_date: next_date_str
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        last_processed: last_processed_str.map(|s| parse_datetime(&s)),
        status: TransactionStatus::from_str(&status_str).unwrap_or_default(),
        created_at: parse_datetime(&created_at_str),
    })
}

/// Fields supplied when creating or editing a transaction
#[derive(Debug, Clone)]
pub struct TransactionFields {
    pub account_id: i64,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub category: String,
    pub is_recurring: bool,
    pub recurring_interval: Option<RecurringInterval>,
    pub status: TransactionStatus,
}

impl TransactionFields {
    fn validate(&self) -> Result<Option<NaiveDate>> {
        if self.amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "transaction amount must be positive, got {}",
                self.amount
            )));
        }

        // A recurring definition without an interval can never be scheduled
        if self.is_recurring {
            let interval = self.recurring_interval.ok_or_else(|| {
                Error::InvalidData(
                    "recurring transaction requires a recurring interval".to_string(),
                )
            })?;
            Ok(Some(next_recurring_date(self.date, interval)))
        } else {
            Ok(None)
        }
    }

    /// Signed effect of this entry on the account balance
    fn balance_delta(&self) -> f64 {
        self.tx_type.balance_sign() * self.amount
    }
}

impl Database {
    /// Create a transaction and apply its balance effect atomically
    pub fn create_transaction(
        &self,
        user_id: i64,
        fields: &TransactionFields,
    ) -> Result<Transaction> {
        let next_date = fields.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // The account must belong to the caller
        let owned: i64 = tx.query_row(
            "SELECT COUNT(*) FROM accounts WHERE id = ? AND user_id = ?",
            params![fields.account_id, user_id],
            |row| row.get(0),
        )?;
        if owned == 0 {
            return Err(Error::NotFound(format!("account {}", fields.account_id)));
        }

        tx.execute(
            r#"
            INSERT INTO transactions
                (user_id, account_id, tx_type, amount, date, description, category,
                 is_recurring, recurring_interval, next_recurring_date, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                fields.account_id,
                fields.tx_type.as_str(),
                fields.amount,
                fields.date.to_string(),
                fields.description,
                fields.category,
                fields.is_recurring,
                fields.recurring_interval.map(|i| i.as_str()),
                next_date.map(|d| d.to_string()),
                fields.status.as_str(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE accounts SET balance = balance + ? WHERE id = ?",
            params![fields.balance_delta(), fields.account_id],
        )?;

        let transaction = tx.query_row(
            &format!(
                "SELECT {} FROM transactions WHERE id = ?",
                TRANSACTION_COLUMNS
            ),
            params![id],
            row_to_transaction,
        )?;

        tx.commit()?;
        Ok(transaction)
    }

    /// Get a transaction by id, scoped to its owner
    pub fn get_transaction(&self, id: i64, user_id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                TRANSACTION_COLUMNS
            ),
            params![id, user_id],
            row_to_transaction,
        );

        match result {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a user's transactions, newest first, optionally scoped to one account
    pub fn list_transactions(
        &self,
        user_id: i64,
        account_id: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let limit = limit.unwrap_or(200);
        let transactions = if let Some(account_id) = account_id {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transactions WHERE user_id = ? AND account_id = ? \
                 ORDER BY date DESC, id DESC LIMIT ?",
                TRANSACTION_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id, account_id, limit], row_to_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transactions WHERE user_id = ? \
                 ORDER BY date DESC, id DESC LIMIT ?",
                TRANSACTION_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id, limit], row_to_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        Ok(transactions)
    }

    /// List a user's transactions with dates in [from, to], newest first
    pub fn list_transactions_in_range(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND date BETWEEN ? AND ? \
             ORDER BY date DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;
        let transactions = stmt
            .query_map(
                params![user_id, from.to_string(), to.to_string()],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Sum transaction amounts for a user by type and date window
    ///
    /// `account_id` and `to` narrow the window; `category` narrows to one
    /// category. Returns 0 when nothing matches.
    pub fn sum_transactions(
        &self,
        user_id: i64,
        account_id: Option<i64>,
        tx_type: TransactionType,
        from: NaiveDate,
        to: Option<NaiveDate>,
        category: Option<&str>,
    ) -> Result<f64> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions \
             WHERE user_id = ?1 AND tx_type = ?2 AND date >= ?3",
        );
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(user_id),
            Box::new(tx_type.as_str()),
            Box::new(from.to_string()),
        ];

        if let Some(account_id) = account_id {
            query_params.push(Box::new(account_id));
            sql.push_str(&format!(" AND account_id = ?{}", query_params.len()));
        }
        if let Some(to) = to {
            query_params.push(Box::new(to.to_string()));
            sql.push_str(&format!(" AND date <= ?{}", query_params.len()));
        }
        if let Some(category) = category {
            query_params.push(Box::new(category.to_string()));
            sql.push_str(&format!(" AND category = ?{}", query_params.len()));
        }

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let total: f64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;

        Ok(total)
    }

    /// Edit a transaction, correcting the account balance by the signed delta
    pub fn update_transaction(
        &self,
        id: i64,
        user_id: i64,
        fields: &TransactionFields,
    ) -> Result<Transaction> {
        let next_date = fields.validate()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![id, user_id],
                row_to_transaction,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Error::NotFound(format!("transaction {}", id))
                }
                other => other.into(),
            })?;

        // Edits stay on the original account
        if old.account_id != fields.account_id {
            return Err(Error::InvalidData(
                "cannot move a transaction between accounts".to_string(),
            ));
        }

        tx.execute(
            r#"
            UPDATE transactions SET
                tx_type = ?, amount = ?, date = ?, description = ?, category = ?,
                is_recurring = ?, recurring_interval = ?, next_recurring_date = ?,
                status = ?
            WHERE id = ?
            "#,
            params![
                fields.tx_type.as_str(),
                fields.amount,
                fields.date.to_string(),
                fields.description,
                fields.category,
                fields.is_recurring,
                fields.recurring_interval.map(|i| i.as_str()),
                next_date.map(|d| d.to_string()),
                fields.status.as_str(),
                id,
            ],
        )?;

        let old_delta = old.tx_type.balance_sign() * old.amount;
        let delta = fields.balance_delta() - old_delta;
        tx.execute(
            "UPDATE accounts SET balance = balance + ? WHERE id = ?",
            params![delta, old.account_id],
        )?;

        let updated = tx.query_row(
            &format!(
                "SELECT {} FROM transactions WHERE id = ?",
                TRANSACTION_COLUMNS
            ),
            params![id],
            row_to_transaction,
        )?;

        tx.commit()?;
        Ok(updated)
    }

    /// Delete a transaction and reverse its balance effect
    pub fn delete_transaction(&self, id: i64, user_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![id, user_id],
                row_to_transaction,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Error::NotFound(format!("transaction {}", id))
                }
                other => other.into(),
            })?;

        tx.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        tx.execute(
            "UPDATE accounts SET balance = balance - ? WHERE id = ?",
            params![old.tx_type.balance_sign() * old.amount, old.account_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Find recurring definitions that are due as of `as_of`
    ///
    /// A definition is due when it has never been processed or its next
    /// occurrence date has arrived. Pure read; the per-item apply re-checks.
    pub fn find_due_recurring(&self, as_of: NaiveDate) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions \
             WHERE is_recurring = TRUE AND status = 'completed' \
               AND (last_processed IS NULL OR next_recurring_date <= ?) \
             ORDER BY user_id, id",
            TRANSACTION_COLUMNS
        ))?;
        let due = stmt
            .query_map(params![as_of.to_string()], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(due)
    }

    /// Stamp a recurring definition as processed and schedule its next run
    pub(crate) fn advance_recurring_schedule(
        tx: &rusqlite::Transaction<'_>,
        id: i64,
        processed_at: chrono::DateTime<chrono::Utc>,
        next_date: NaiveDate,
    ) -> Result<()> {
        tx.execute(
            "UPDATE transactions SET last_processed = ?, next_recurring_date = ? WHERE id = ?",
            params![
                format_datetime(processed_at),
                next_date.to_string(),
                id
            ],
        )?;
        Ok(())
    }
}
