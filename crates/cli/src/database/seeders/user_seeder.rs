use async_trait::async_trait;
use plinth_orm::{DatabaseValue, OrmError, OrmResult, SeedContext, Seeder};

/// Sample accounts, all with the password `123456`
const USERS: &[(&str, &str, bool)] = &[
    ("João Silva", "joao@example.com", true),
    ("Maria Santos", "maria@example.com", true),
    ("Pedro Oliveira", "pedro@example.com", false),
];

const DEFAULT_PASSWORD: &str = "123456";

pub struct UserSeeder;

#[async_trait]
impl Seeder for UserSeeder {
    async fn run(&self, ctx: &SeedContext<'_>) -> OrmResult<()> {
        ctx.truncate("users").await?;

        let mut rows = Vec::with_capacity(USERS.len());
        for (name, email, active) in USERS {
            let password = bcrypt::hash(DEFAULT_PASSWORD, bcrypt::DEFAULT_COST)
                .map_err(|e| OrmError::Validation(format!("Failed to hash password: {}", e)))?;
            rows.push(vec![
                ("name", DatabaseValue::from(*name)),
                ("email", DatabaseValue::from(*email)),
                ("password", DatabaseValue::from(password)),
                ("active", DatabaseValue::from(*active)),
            ]);
        }

        let inserted = ctx.insert_many("users", &rows).await?;
        tracing::info!(inserted, "sample users seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinth_orm::testing::MemoryPool;

    #[tokio::test]
    async fn test_truncates_then_inserts_all_users() {
        let pool = MemoryPool::new();
        UserSeeder.run(&SeedContext::new(&pool)).await.unwrap();

        assert_eq!(
            pool.statements(),
            vec![
                "TRUNCATE TABLE `users`",
                "INSERT INTO `users` (`name`, `email`, `password`, `active`) VALUES (?, ?, ?, ?), (?, ?, ?, ?), (?, ?, ?, ?)",
            ]
        );
    }
}
