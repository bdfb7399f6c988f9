mod commands;
mod database;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use commands::*;
use plinth_core::{init_logging, load_dotenv, AppConfig, AppConfigTrait, LoggingConfig, MigrationSettings};
use plinth_orm::{Environment, MigrationConfig, MigrationManager, SeederManager};

#[derive(Parser)]
#[command(name = "plinth")]
#[command(version, about = "Schema migrations and seeders for MySQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration management (runs pending migrations by default)
    Migrate {
        #[command(subcommand)]
        migrate_command: Option<MigrateCommands>,
    },

    /// Database seeding
    Db {
        #[command(subcommand)]
        db_command: DbCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Run,

    /// Roll back the last batch
    Rollback,

    /// Roll back every applied migration
    Reset,

    /// Reset, then run every migration again
    Refresh,

    /// Show migration status
    Status,

    /// Release a lock left behind by a crashed run
    Unlock,

    /// Create a new migration
    Make {
        /// Migration name (e.g., create_posts_table)
        name: String,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database seeders
    Seed {
        /// Run only this seeder
        #[arg(long)]
        class: Option<String>,

        /// Run seeders even in production
        #[arg(long)]
        force: bool,
    },

    /// List registered seeders
    List,

    /// Create a new seeder
    Make {
        /// Seeder name (e.g., PostSeeder)
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Database-backed migration operations
#[derive(Clone, Copy)]
enum MigrateOperation {
    Run,
    Rollback,
    Reset,
    Refresh,
    Status,
    Unlock,
}

async fn run(cli: Cli) -> Result<bool> {
    load_dotenv();

    match cli.command {
        Commands::Migrate { migrate_command } => {
            let operation = match migrate_command.unwrap_or(MigrateCommands::Run) {
                MigrateCommands::Make { name } => {
                    let settings = scaffold_settings()?;
                    make::migration(&settings.migrations_path, &name, Utc::now())?;
                    return Ok(true);
                }
                MigrateCommands::Run => MigrateOperation::Run,
                MigrateCommands::Rollback => MigrateOperation::Rollback,
                MigrateCommands::Reset => MigrateOperation::Reset,
                MigrateCommands::Refresh => MigrateOperation::Refresh,
                MigrateCommands::Status => MigrateOperation::Status,
                MigrateCommands::Unlock => MigrateOperation::Unlock,
            };
            run_migrations(operation).await
        }
        Commands::Db {
            db_command: DbCommands::Make { name },
        } => {
            let settings = scaffold_settings()?;
            make::seeder(&settings.seeders_path, &name)?;
            Ok(true)
        }
        Commands::Db {
            db_command: DbCommands::List,
        } => run_seeders(None, false, true).await,
        Commands::Db {
            db_command: DbCommands::Seed { class, force },
        } => run_seeders(class.as_deref(), force, false).await,
    }
}

async fn run_migrations(operation: MigrateOperation) -> Result<bool> {
    let config = app_config()?;
    let pool = database::connect(&config.database).await?;

    let migration_config = MigrationConfig {
        migrations_table: config.migrations.table.clone(),
        lock_owner: Some(migrate::runner_name()),
    };
    let manager = MigrationManager::new(
        pool.clone(),
        Arc::new(database::migrations::registry()?),
        migration_config,
    )
    .await?;

    let succeeded = match operation {
        MigrateOperation::Run => migrate::run(&manager).await?,
        MigrateOperation::Rollback => migrate::rollback(&manager).await?,
        MigrateOperation::Reset => migrate::reset(&manager).await?,
        MigrateOperation::Refresh => migrate::refresh(&manager).await?,
        MigrateOperation::Status => migrate::status(&manager).await?,
        MigrateOperation::Unlock => migrate::unlock(&manager).await?,
    };

    pool.close().await?;
    Ok(succeeded)
}

async fn run_seeders(class: Option<&str>, force: bool, list_only: bool) -> Result<bool> {
    let config = app_config()?;
    let pool = database::connect(&config.database).await?;

    let manager = SeederManager::new(pool.clone(), Arc::new(database::seeders::registry()?))
        .with_environment(Environment::from_name(&config.environment))
        .force(force);

    let succeeded = if list_only {
        db::list(&manager)?
    } else {
        db::seed(&manager, class).await?
    };

    pool.close().await?;
    Ok(succeeded)
}

/// Full configuration for commands that talk to the database; initialises logging
fn app_config() -> Result<AppConfig> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    start_logging(&config.logging)?;
    Ok(config)
}

/// Paths only, so scaffolding works without database settings; initialises logging
fn scaffold_settings() -> Result<MigrationSettings> {
    let logging = LoggingConfig::from_env()?;
    logging.validate()?;
    start_logging(&logging)?;

    let settings = MigrationSettings::from_env()?;
    settings.validate()?;
    Ok(settings)
}

fn start_logging(config: &LoggingConfig) -> Result<()> {
    init_logging(config).map_err(|e| anyhow!("failed to initialize logging: {}", e))
}
