//! Account operations

use std::str::FromStr;

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Account, AccountType};

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let type_str: String = row.get(3)?;
    let created_at_str: String = row.get(6)?;
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        account_type: AccountType::from_str(&type_str).unwrap_or_default(),
        balance: row.get(4)?,
        is_default: row.get(5)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, user_id, name, account_type, balance, is_default, created_at";

impl Database {
    /// Create an account
    ///
    /// When `is_default` is set, any other default for the same user is
    /// unset in the same transaction so exactly one default survives.
    pub fn create_account(
        &self,
        user_id: i64,
        name: &str,
        account_type: AccountType,
        opening_balance: f64,
        is_default: bool,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // First account for a user becomes the default regardless
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM accounts WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        let make_default = is_default || existing == 0;

        if make_default {
            tx.execute(
                "UPDATE accounts SET is_default = FALSE WHERE user_id = ?",
                params![user_id],
            )?;
        }

        tx.execute(
            r#"
            INSERT INTO accounts (user_id, name, account_type, balance, is_default)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                name,
                account_type.as_str(),
                opening_balance,
                make_default
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(id)
    }

    /// Get an account by id, scoped to its owner
    pub fn get_account(&self, id: i64, user_id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM accounts WHERE id = ? AND user_id = ?",
                ACCOUNT_COLUMNS
            ),
            params![id, user_id],
            row_to_account,
        );

        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a user's accounts
    pub fn list_accounts(&self, user_id: i64) -> Result<Vec<Account>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map(params![user_id], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Get a user's default account, if any
    pub fn get_default_account(&self, user_id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            &format!(
                "SELECT {} FROM accounts WHERE user_id = ? AND is_default = TRUE",
                ACCOUNT_COLUMNS
            ),
            params![user_id],
            row_to_account,
        );

        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Make an account the user's default
    ///
    /// Unsets every other default for the user and sets this one inside a
    /// single transaction, so two racing toggles cannot both stick.
    pub fn set_default_account(&self, id: i64, user_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE accounts SET is_default = FALSE WHERE user_id = ?",
            params![user_id],
        )?;
        let updated = tx.execute(
            "UPDATE accounts SET is_default = TRUE WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("account {}", id)));
        }

        tx.commit()?;
        Ok(())
    }
}
