//! Advisory lock for migration runs
//!
//! A single-row table guards `migrate`, `rollback`, `reset` and `refresh`.
//! Acquiring inserts row `id = 1` tagged with the runner's owner token; the
//! primary key makes a second concurrent insert fail. The row is deleted on
//! release. A runner that crashed leaves the row behind, which
//! [`MigrationLock::force_release`] clears.

use super::schema_builder::{quote_identifier, Blueprint};
use crate::backends::{DatabaseExecutor, DatabaseValue};
use crate::error::{OrmError, OrmResult};

/// Proof of a held lock, consumed by [`MigrationLock::release`]
#[derive(Debug)]
#[must_use = "a held migration lock must be released"]
pub struct LockToken {
    owner: String,
}

impl LockToken {
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

/// SQL access to the lock table
#[derive(Debug, Clone)]
pub struct MigrationLock {
    table: String,
}

impl MigrationLock {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn create_table_sql(&self) -> String {
        let mut table = Blueprint::new(&self.table);
        table.column("id", "INT PRIMARY KEY");
        table.column("owner", "VARCHAR(64) NOT NULL");
        table.column("acquired_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP");
        table.to_sql()
    }

    pub fn acquire_sql(&self) -> String {
        format!("INSERT INTO {} (id, owner) VALUES (1, ?)", quote_identifier(&self.table))
    }

    pub fn holder_sql(&self) -> String {
        format!(
            "SELECT owner, acquired_at FROM {} WHERE id = 1",
            quote_identifier(&self.table)
        )
    }

    pub fn release_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE id = 1 AND owner = ?",
            quote_identifier(&self.table)
        )
    }

    pub fn force_release_sql(&self) -> String {
        format!("DELETE FROM {} WHERE id = 1", quote_identifier(&self.table))
    }

    pub async fn ensure_table(&self, executor: &dyn DatabaseExecutor) -> OrmResult<()> {
        executor
            .execute(&self.create_table_sql(), &[])
            .await
            .map_err(|e| OrmError::Migration(format!("Failed to create lock table: {}", e)))?;
        Ok(())
    }

    /// Take the lock for `owner`, failing with [`OrmError::Locked`] if held
    pub async fn acquire(&self, executor: &dyn DatabaseExecutor, owner: &str) -> OrmResult<LockToken> {
        match executor.execute(&self.acquire_sql(), &[DatabaseValue::from(owner)]).await {
            Ok(_) => {
                tracing::debug!(owner = %owner, "migration lock acquired");
                Ok(LockToken {
                    owner: owner.to_string(),
                })
            }
            Err(insert_error) => match self.holder(executor).await? {
                Some((holder, acquired_at)) => Err(OrmError::Locked {
                    owner: holder,
                    acquired_at,
                }),
                None => Err(OrmError::Migration(format!(
                    "Failed to acquire migration lock: {}",
                    insert_error
                ))),
            },
        }
    }

    /// Current holder and acquisition time, if the lock is taken
    pub async fn holder(&self, executor: &dyn DatabaseExecutor) -> OrmResult<Option<(String, String)>> {
        let row = executor
            .fetch_optional(&self.holder_sql(), &[])
            .await
            .map_err(|e| OrmError::Migration(format!("Failed to read migration lock: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let owner = row
            .get_by_name("owner")?
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        let acquired_at = row
            .get_by_name("acquired_at")?
            .as_datetime()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "unknown time".to_string());

        Ok(Some((owner, acquired_at)))
    }

    pub async fn release(&self, executor: &dyn DatabaseExecutor, token: LockToken) -> OrmResult<()> {
        let released = executor
            .execute(&self.release_sql(), &[DatabaseValue::from(token.owner.as_str())])
            .await
            .map_err(|e| OrmError::Migration(format!("Failed to release migration lock: {}", e)))?;

        if released == 0 {
            tracing::warn!(owner = %token.owner, "migration lock was no longer held at release");
        } else {
            tracing::debug!(owner = %token.owner, "migration lock released");
        }
        Ok(())
    }

    /// Drop the lock regardless of owner. Returns whether a row was removed.
    pub async fn force_release(&self, executor: &dyn DatabaseExecutor) -> OrmResult<bool> {
        let removed = executor
            .execute(&self.force_release_sql(), &[])
            .await
            .map_err(|e| OrmError::Migration(format!("Failed to clear migration lock: {}", e)))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryPool;

    #[tokio::test]
    async fn test_second_acquire_is_rejected_until_release() {
        let pool = MemoryPool::new();
        let lock = MigrationLock::new("migrations_lock");
        lock.ensure_table(&pool).await.unwrap();

        let token = lock.acquire(&pool, "runner-a").await.unwrap();
        assert_eq!(token.owner(), "runner-a");

        match lock.acquire(&pool, "runner-b").await {
            Err(OrmError::Locked { owner, .. }) => assert_eq!(owner, "runner-a"),
            other => panic!("expected Locked, got {:?}", other.map(|t| t.owner().to_string())),
        }

        lock.release(&pool, token).await.unwrap();
        let token = lock.acquire(&pool, "runner-b").await.unwrap();
        lock.release(&pool, token).await.unwrap();
        assert!(lock.holder(&pool).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_force_release_clears_stale_lock() {
        let pool = MemoryPool::new();
        let lock = MigrationLock::new("migrations_lock");

        let _stale = lock.acquire(&pool, "crashed").await.unwrap();
        assert!(lock.force_release(&pool).await.unwrap());
        assert!(!lock.force_release(&pool).await.unwrap());

        let token = lock.acquire(&pool, "fresh").await.unwrap();
        lock.release(&pool, token).await.unwrap();
    }
}
