//! # plinth-core
//!
//! Environment-driven configuration and logging setup for plinth.

pub mod config;
pub mod logging;

pub use config::{
    load_dotenv, AppConfig, AppConfigTrait, ConfigError, ConfigSource, DatabaseConfig, LoggingConfig,
    MigrationSettings,
};
pub use logging::init_logging;
