//! Application migrations
//!
//! `plinth migrate make <name>` writes a new file here; declare its module
//! and register it in [`registry`] under the identifier from its file name.

mod m2024_01_01_000000_create_users_table;
mod m2024_01_01_123456_create_test_table;

use plinth_orm::{Migration, OrmResult, Registry};

pub fn registry() -> OrmResult<Registry<dyn Migration>> {
    let mut registry: Registry<dyn Migration> = Registry::new();
    registry
        .register("2024_01_01_000000_create_users_table", || {
            Box::new(m2024_01_01_000000_create_users_table::CreateUsersTable)
        })?
        .register("2024_01_01_123456_create_test_table", || {
            Box::new(m2024_01_01_123456_create_test_table::CreateTestTable)
        })?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_orm::testing::MemoryPool;
    use plinth_orm::{Loader, Schema};

    #[test]
    fn test_registry_order() {
        let registry = registry().unwrap();
        assert_eq!(
            registry.identifiers(),
            vec![
                "2024_01_01_000000_create_users_table",
                "2024_01_01_123456_create_test_table",
            ]
        );
    }

    #[tokio::test]
    async fn test_users_table_up_and_down() {
        let pool = MemoryPool::new();
        let schema = Schema::new(&pool);
        let unit = registry()
            .unwrap()
            .load("2024_01_01_000000_create_users_table")
            .unwrap();

        unit.up(&schema).await.unwrap();
        unit.down(&schema).await.unwrap();

        let statements = pool.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS `users`"));
        assert!(statements[0].contains("`email` VARCHAR(255) UNIQUE"));
        assert!(statements[0].contains("`active` BOOLEAN DEFAULT TRUE"));
        assert_eq!(statements[1], "DROP TABLE IF EXISTS `users`");
    }
}
