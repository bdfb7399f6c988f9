//! Seeder manager for running registered seeders

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::seeder::{Environment, SeedContext, Seeder};
use crate::backends::DatabasePool;
use crate::error::{OrmError, OrmResult};
use crate::registry::Loader;

/// Loader resolving seeder identifiers
pub type SeederLoader = dyn Loader<dyn Seeder>;

/// Outcome of one seeder run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOutcome {
    pub seeder: String,
    pub error: Option<String>,
}

impl SeedOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for SeedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "✓ Seeded: {}", self.seeder),
            Some(error) => write!(f, "✗ Failed to seed {}: {}", self.seeder, error),
        }
    }
}

/// Ordered outcomes, ending at the first failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub outcomes: Vec<SeedOutcome>,
}

impl SeedReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SeedOutcome::is_success)
    }

    pub fn failure(&self) -> Option<&SeedOutcome> {
        self.outcomes.iter().find(|outcome| !outcome.is_success())
    }

    pub fn lines(&self) -> Vec<String> {
        if self.outcomes.is_empty() {
            return vec!["Nothing to seed.".to_string()];
        }
        self.outcomes.iter().map(|outcome| outcome.to_string()).collect()
    }
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// Seeder manager for running multiple seeders
pub struct SeederManager {
    pool: Arc<dyn DatabasePool>,
    loader: Arc<SeederLoader>,
    environment: Environment,
    force: bool,
}

impl SeederManager {
    pub fn new(pool: Arc<dyn DatabasePool>, loader: Arc<SeederLoader>) -> Self {
        Self {
            pool,
            loader,
            environment: Environment::default(),
            force: false,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Allow [`SeederManager::run`] in environments unsafe for seeding
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Registered seeder identifiers, ascending
    pub fn list(&self) -> Vec<String> {
        let mut identifiers = self.loader.identifiers();
        identifiers.sort();
        identifiers.dedup();
        identifiers
    }

    /// Run every seeder in identifier order, stopping at the first failure
    pub async fn run(&self) -> OrmResult<SeedReport> {
        if !self.environment.is_safe_for_seeding() {
            if !self.force {
                return Err(OrmError::Validation(format!(
                    "Environment '{}' is not safe for automatic seeding. Use explicit opt-in.",
                    self.environment
                )));
            }
            tracing::warn!(environment = %self.environment, "force running seeders");
        }

        let seeders = self.list();
        tracing::info!(
            "Running {} seeders for environment: {}",
            seeders.len(),
            self.environment
        );

        let mut report = SeedReport::default();
        for seeder in &seeders {
            let outcome = self.execute(seeder).await;
            let failed = !outcome.is_success();
            report.outcomes.push(outcome);
            if failed {
                break;
            }
        }

        Ok(report)
    }

    /// Run exactly one seeder, regardless of environment
    pub async fn run_seeder(&self, identifier: &str) -> SeedReport {
        SeedReport {
            outcomes: vec![self.execute(identifier).await],
        }
    }

    async fn execute(&self, identifier: &str) -> SeedOutcome {
        let result = match self.loader.load(identifier) {
            Ok(seeder) => {
                tracing::info!("Running seeder: {}", identifier);
                let ctx = SeedContext::new(self.pool.as_executor());
                seeder.run(&ctx).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => SeedOutcome {
                seeder: identifier.to_string(),
                error: None,
            },
            Err(e) => {
                tracing::error!(seeder = %identifier, error = %e, "seeder failed");
                SeedOutcome {
                    seeder: identifier.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::testing::MemoryPool;
    use async_trait::async_trait;

    struct Touch(&'static str);

    #[async_trait]
    impl Seeder for Touch {
        async fn run(&self, ctx: &SeedContext<'_>) -> OrmResult<()> {
            ctx.execute(&format!("-- seed {}", self.0)).await?;
            Ok(())
        }
    }

    fn manager(pool: &MemoryPool, ids: &[&'static str]) -> SeederManager {
        let mut registry: Registry<dyn Seeder> = Registry::new();
        for id in ids {
            let id = *id;
            registry.register(id, move || Box::new(Touch(id))).unwrap();
        }
        SeederManager::new(Arc::new(pool.clone()), Arc::new(registry))
    }

    #[tokio::test]
    async fn test_run_executes_in_order() {
        let pool = MemoryPool::new();
        let manager = manager(&pool, &["UserSeeder", "PostSeeder"]);

        assert_eq!(manager.list(), vec!["PostSeeder", "UserSeeder"]);
        let report = manager.run().await.unwrap();
        assert_eq!(report.lines(), vec!["✓ Seeded: PostSeeder", "✓ Seeded: UserSeeder"]);
        assert_eq!(pool.statements(), vec!["-- seed PostSeeder", "-- seed UserSeeder"]);
    }

    #[tokio::test]
    async fn test_run_halts_on_failure() {
        let pool = MemoryPool::new();
        pool.fail_on("-- seed B");
        let manager = manager(&pool, &["A", "B", "C"]);

        let report = manager.run().await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.lines()[1].starts_with("✗ Failed to seed B:"));
        assert!(pool.statements_matching("-- seed C").is_empty());
    }

    #[tokio::test]
    async fn test_run_seeder_reports_single_outcome() {
        let pool = MemoryPool::new();
        let manager = manager(&pool, &["A"]);

        assert!(manager.run_seeder("A").await.is_success());
        let missing = manager.run_seeder("Missing").await;
        assert_eq!(missing.outcomes.len(), 1);
        assert_eq!(missing.failure().map(|o| o.seeder.as_str()), Some("Missing"));
    }

    #[tokio::test]
    async fn test_production_requires_force() {
        let pool = MemoryPool::new();
        let manager = manager(&pool, &["A"]).with_environment(Environment::Production);

        assert!(matches!(manager.run().await, Err(OrmError::Validation(_))));
        assert!(pool.statements().is_empty());

        // explicit single-seeder runs are not gated
        assert!(manager.run_seeder("A").await.is_success());

        let manager = manager.force(true);
        assert!(manager.run().await.unwrap().is_success());
    }

    #[test]
    fn test_empty_report() {
        assert_eq!(SeedReport::default().to_string(), "Nothing to seed.");
    }
}
