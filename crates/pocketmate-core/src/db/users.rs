//! User provisioning and lookup

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::User;

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at_str: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        auth_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        currency: row.get(4)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const USER_COLUMNS: &str = "id, auth_id, email, name, currency, created_at";

impl Database {
    /// Look up a user by external auth id, creating the row on first sight
    ///
    /// This is the provisioning path: the identity provider authenticates the
    /// request and we materialize a local profile the first time we see it.
    pub fn upsert_user(&self, auth_id: &str, email: &str, name: Option<&str>) -> Result<User> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO users (auth_id, email, name)
            VALUES (?, ?, ?)
            ON CONFLICT(auth_id) DO UPDATE SET
                email = excluded.email,
                name = COALESCE(excluded.name, users.name)
            "#,
            params![auth_id, email, name],
        )?;

        let user = conn.query_row(
            &format!("SELECT {} FROM users WHERE auth_id = ?", USER_COLUMNS),
            params![auth_id],
            row_to_user,
        )?;

        Ok(user)
    }

    /// Get a user by internal id
    pub fn get_user(&self, id: i64) -> Result<User> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            params![id],
            row_to_user,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound(format!("user {}", id)),
            other => other.into(),
        })
    }

    /// Get a user by external auth id
    pub fn get_user_by_auth_id(&self, auth_id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            &format!("SELECT {} FROM users WHERE auth_id = ?", USER_COLUMNS),
            params![auth_id],
            row_to_user,
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all users, for the monthly report sweep
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY id",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Update a user's preferred currency code (display-only)
    pub fn update_user_currency(&self, id: i64, currency: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET currency = ? WHERE id = ?",
            params![currency, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}
