//! Database Seeding
//!
//! Unledgered data-population units and the manager that runs them.

pub mod manager;
pub mod seeder;

pub use manager::{SeedOutcome, SeedReport, SeederLoader, SeederManager};
pub use seeder::{Environment, SeedContext, Seeder};
