//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_user` - Provision/fetch the acting user
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use pocketmate_core::db::Database;
use pocketmate_core::models::User;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path.to_str().unwrap();
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Provision (or fetch) the acting user for --user
///
/// The CLI has no identity provider, so the email doubles as the external
/// auth id.
pub fn resolve_user(db: &Database, email: &str) -> Result<User> {
    db.upsert_user(email, email, None)
        .context("Failed to resolve user")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create an account: pocketmate account add \"Main\"");
    println!("  2. Record a transaction: pocketmate tx add --account 1 --amount 9.99 --description \"Coffee\"");
    println!("  3. Start web UI: pocketmate serve");

    Ok(())
}
