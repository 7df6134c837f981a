//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod accounts;
pub mod auth;
pub mod budgets;
pub mod jobs;
pub mod receipts;
pub mod stats;
pub mod transactions;

// Re-export all handlers for use in router
pub use accounts::*;
pub use auth::*;
pub use budgets::*;
pub use jobs::*;
pub use receipts::*;
pub use stats::*;
pub use transactions::*;
