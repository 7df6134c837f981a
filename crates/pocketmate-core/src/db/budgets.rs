//! Budget operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::Budget;

fn row_to_budget(row: &rusqlite::Row<'_>) -> rusqlite::Result<Budget> {
    let last_alert_str: Option<String> = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        last_alert_sent: last_alert_str.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at_str),
    })
}

const BUDGET_COLUMNS: &str = "id, user_id, amount, last_alert_sent, created_at";

impl Database {
    /// Create or replace a user's budget ceiling
    ///
    /// The alert timestamp is preserved on update so changing the amount
    /// mid-month cannot trigger a second alert in the same month.
    pub fn upsert_budget(&self, user_id: i64, amount: f64) -> Result<Budget> {
        if amount <= 0.0 {
            return Err(Error::InvalidData(format!(
                "budget amount must be positive, got {}",
                amount
            )));
        }

        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO budgets (user_id, amount)
            VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET amount = excluded.amount
            "#,
            params![user_id, amount],
        )?;

        let budget = conn.query_row(
            &format!("SELECT {} FROM budgets WHERE user_id = ?", BUDGET_COLUMNS),
            params![user_id],
            row_to_budget,
        )?;

        Ok(budget)
    }

    /// Get a user's budget, if one is set
    pub fn get_budget(&self, user_id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM budgets WHERE user_id = ?", BUDGET_COLUMNS),
            params![user_id],
            row_to_budget,
        );

        match result {
            Ok(budget) => Ok(Some(budget)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List every budget, for the periodic monitor sweep
    pub fn list_budgets(&self) -> Result<Vec<Budget>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budgets ORDER BY id",
            BUDGET_COLUMNS
        ))?;
        let budgets = stmt
            .query_map([], row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(budgets)
    }

    /// Record that an alert was sent for this budget
    pub fn mark_budget_alert_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE budgets SET last_alert_sent = ? WHERE id = ?",
            params![format_datetime(sent_at), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("budget {}", id)));
        }
        Ok(())
    }
}
