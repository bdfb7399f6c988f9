use anyhow::Result;
use plinth_orm::SeederManager;

/// Run every seeder, or only `class` when given
pub async fn seed(manager: &SeederManager, class: Option<&str>) -> Result<bool> {
    let report = match class {
        Some(class) => manager.run_seeder(class).await,
        None => manager.run().await?,
    };

    for line in report.lines() {
        println!("{}", line);
    }
    Ok(report.is_success())
}

pub fn list(manager: &SeederManager) -> Result<bool> {
    let seeders = manager.list();
    if seeders.is_empty() {
        println!("No seeders found.");
    } else {
        println!("Available seeders:");
        for seeder in seeders {
            println!("  {}", seeder);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::seeders;
    use plinth_orm::testing::MemoryPool;
    use plinth_orm::Environment;
    use std::sync::Arc;

    fn manager(pool: &MemoryPool) -> SeederManager {
        SeederManager::new(Arc::new(pool.clone()), Arc::new(seeders::registry().unwrap()))
    }

    #[tokio::test]
    async fn test_unknown_class_fails() {
        let pool = MemoryPool::new();
        assert!(!seed(&manager(&pool), Some("NopeSeeder")).await.unwrap());
        assert!(pool.statements().is_empty());
    }

    #[tokio::test]
    async fn test_production_seed_is_refused_without_force() {
        let pool = MemoryPool::new();
        let manager = manager(&pool).with_environment(Environment::Production);

        assert!(seed(&manager, None).await.is_err());
        assert!(pool.statements().is_empty());
    }

    #[tokio::test]
    async fn test_seed_failure_is_reported() {
        let pool = MemoryPool::new();
        pool.fail_on("TRUNCATE");

        assert!(!seed(&manager(&pool), None).await.unwrap());
    }
}
