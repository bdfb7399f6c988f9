//! Migration System
//!
//! Versioned, reversible schema changes tracked in a ledger table:
//!
//! - [`schema_builder`]: `CREATE TABLE` statement builder used by migrations
//! - [`unit`]: the [`Migration`] contract and its [`Schema`] helper surface
//! - [`ledger`] and [`lock`]: the control tables
//! - [`manager`]: `status`, `migrate`, `rollback`, `reset` and `refresh`

pub mod definitions;
pub mod ledger;
pub mod lock;
pub mod manager;
pub mod schema_builder;
pub mod unit;

pub use definitions::*;
pub use ledger::MigrationLedger;
pub use lock::{LockToken, MigrationLock};
pub use manager::{MigrationLoader, MigrationManager};
pub use schema_builder::{Blueprint, ColumnDefault};
pub use unit::{migration_identifier, snake_case, Migration, Schema};
