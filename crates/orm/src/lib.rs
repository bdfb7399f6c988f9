//! # plinth-orm: schema migrations and seeding
//!
//! Versioned schema changes tracked in a ledger table, applied and reverted
//! in batches, plus unledgered data seeders and a `CREATE TABLE` builder.
//!
//! Units are resolved through an explicit [`Registry`] and run against an
//! injected [`DatabasePool`]; nothing here opens or closes connections on
//! its own.

pub mod backends;
pub mod error;
pub mod migrations;
pub mod registry;
pub mod seeding;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backends::{
    DatabaseBackend, DatabaseBackendType, DatabaseExecutor, DatabasePool, DatabasePoolConfig,
    DatabaseRow, DatabaseTransaction, DatabaseValue, MySqlBackend, MySqlPool, SqlDialect,
};
pub use error::{OrmError, OrmResult};
pub use migrations::{
    migration_identifier, snake_case, Blueprint, Migration, MigrationConfig, MigrationManager,
    MigrationRecord, MigrationReport, MigrationStatus, Schema, StatusEntry, StatusReport, StepOutcome,
};
pub use registry::{Loader, Registry};
pub use seeding::{Environment, SeedContext, SeedReport, Seeder, SeederManager};
