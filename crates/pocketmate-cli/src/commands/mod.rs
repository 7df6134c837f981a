//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, resolve_user) and init
//! - `accounts` - Account commands (add, list, set-default)
//! - `budget` - Budget commands (set, show)
//! - `jobs` - Manual triggers for the three background routines
//! - `serve` - Web server command
//! - `stats` - Monthly statistics command
//! - `transactions` - Transaction commands (add, list)

pub mod accounts;
pub mod budget;
pub mod core;
pub mod jobs;
pub mod serve;
pub mod stats;
pub mod transactions;

// Re-export command functions for main.rs
pub use accounts::*;
pub use budget::*;
pub use core::*;
pub use jobs::*;
pub use serve::*;
pub use stats::*;
pub use transactions::*;

/// Truncate a string to a maximum length, adding "..." if truncated
///
/// Cuts on a char boundary so multi-byte text never splits mid-character.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let end = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= keep)
        .last()
        .unwrap_or(0);
    format!("{}...", &s[..end])
}
