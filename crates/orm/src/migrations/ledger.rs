//! Migration ledger
//!
//! The control table recording which migrations are applied and in which
//! batch. Rows are inserted after a successful `up` and deleted after a
//! successful `down`; they are never updated in place.

use super::definitions::MigrationRecord;
use super::schema_builder::{quote_identifier, Blueprint};
use crate::backends::{required_column, DatabaseExecutor, DatabaseRow, DatabaseValue};
use crate::error::{OrmError, OrmResult};

/// SQL access to the ledger table
#[derive(Debug, Clone)]
pub struct MigrationLedger {
    table: String,
}

impl MigrationLedger {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL to create the migrations tracking table
    pub fn create_table_sql(&self) -> String {
        let mut table = Blueprint::new(&self.table);
        table.id();
        table.column("migration", "VARCHAR(255) NOT NULL");
        table.column("batch", "INT NOT NULL");
        table.column("executed_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP");
        table.index("migration");
        table.to_sql()
    }

    /// SQL to list applied migrations in application order
    pub fn select_records_sql(&self) -> String {
        format!(
            "SELECT migration, batch, executed_at FROM {} ORDER BY id ASC",
            quote_identifier(&self.table)
        )
    }

    /// SQL to record a migration as applied
    pub fn insert_record_sql(&self) -> String {
        format!(
            "INSERT INTO {} (migration, batch) VALUES (?, ?)",
            quote_identifier(&self.table)
        )
    }

    /// SQL to remove a migration record (for rollback)
    pub fn delete_record_sql(&self) -> String {
        format!("DELETE FROM {} WHERE migration = ?", quote_identifier(&self.table))
    }

    /// Create the ledger table if it does not exist
    pub async fn ensure_table(&self, executor: &dyn DatabaseExecutor) -> OrmResult<()> {
        executor
            .execute(&self.create_table_sql(), &[])
            .await
            .map_err(|e| OrmError::Migration(format!("Failed to create migrations table: {}", e)))?;
        Ok(())
    }

    /// Every ledger row, oldest first
    pub async fn records(&self, executor: &dyn DatabaseExecutor) -> OrmResult<Vec<MigrationRecord>> {
        let rows = self.fetch_rows(executor).await?;
        rows.iter().map(|row| record_from_row(row.as_ref())).collect()
    }

    /// Like [`MigrationLedger::records`], but rows that cannot be decoded are
    /// described in the second list instead of failing the read
    pub async fn scan(&self, executor: &dyn DatabaseExecutor) -> OrmResult<(Vec<MigrationRecord>, Vec<String>)> {
        let rows = self.fetch_rows(executor).await?;

        let mut records = Vec::with_capacity(rows.len());
        let mut invalid = Vec::new();
        for row in &rows {
            match record_from_row(row.as_ref()) {
                Ok(record) => records.push(record),
                Err(e) => invalid.push(e.to_string()),
            }
        }
        Ok((records, invalid))
    }

    async fn fetch_rows(&self, executor: &dyn DatabaseExecutor) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        executor
            .fetch_all(&self.select_records_sql(), &[])
            .await
            .map_err(|e| OrmError::Migration(format!("Failed to query applied migrations: {}", e)))
    }

    pub async fn record(&self, executor: &dyn DatabaseExecutor, migration: &str, batch: i32) -> OrmResult<()> {
        executor
            .execute(
                &self.insert_record_sql(),
                &[DatabaseValue::from(migration), DatabaseValue::from(batch)],
            )
            .await
            .map_err(|e| OrmError::Migration(format!("Failed to record migration {}: {}", migration, e)))?;
        Ok(())
    }

    pub async fn remove(&self, executor: &dyn DatabaseExecutor, migration: &str) -> OrmResult<()> {
        let removed = executor
            .execute(&self.delete_record_sql(), &[DatabaseValue::from(migration)])
            .await
            .map_err(|e| {
                OrmError::Migration(format!("Failed to remove migration record {}: {}", migration, e))
            })?;

        if removed == 0 {
            tracing::warn!(migration = %migration, "no ledger row removed; record was already gone");
        }
        Ok(())
    }

    /// Highest batch in `records`, `None` when empty
    pub(crate) fn max_batch(records: &[MigrationRecord]) -> Option<i32> {
        records.iter().map(|record| record.batch).max()
    }
}

fn record_from_row(row: &dyn DatabaseRow) -> OrmResult<MigrationRecord> {
    let migration = required_column(row, "migration")?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OrmError::Migration("Ledger column 'migration' is not text".to_string()))?;

    let batch = required_column(row, "batch")?
        .as_i64()
        .and_then(|batch| i32::try_from(batch).ok())
        .filter(|batch| *batch > 0)
        .ok_or_else(|| {
            OrmError::Migration(format!("Ledger row for {} has an invalid batch", migration))
        })?;

    let executed_at = row.get_by_name("executed_at")?.as_datetime();

    Ok(MigrationRecord {
        migration,
        batch,
        executed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryPool;

    #[test]
    fn test_create_table_sql() {
        let ledger = MigrationLedger::new("migrations");
        let sql = ledger.create_table_sql();

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `migrations`"));
        assert!(sql.contains("`id` INT AUTO_INCREMENT PRIMARY KEY"));
        assert!(sql.contains("`migration` VARCHAR(255) NOT NULL"));
        assert!(sql.contains("`batch` INT NOT NULL"));
        assert!(sql.contains("`executed_at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_statement_sql() {
        let ledger = MigrationLedger::new("schema_log");
        assert_eq!(
            ledger.insert_record_sql(),
            "INSERT INTO `schema_log` (migration, batch) VALUES (?, ?)"
        );
        assert_eq!(ledger.delete_record_sql(), "DELETE FROM `schema_log` WHERE migration = ?");
        assert!(ledger.select_records_sql().ends_with("ORDER BY id ASC"));
    }

    #[tokio::test]
    async fn test_record_and_remove() {
        let pool = MemoryPool::new();
        let ledger = MigrationLedger::new("migrations");
        ledger.ensure_table(&pool).await.unwrap();

        assert!(ledger.records(&pool).await.unwrap().is_empty());

        ledger.record(&pool, "2024_a", 1).await.unwrap();
        ledger.record(&pool, "2024_b", 2).await.unwrap();
        ledger.record(&pool, "2024_c", 2).await.unwrap();

        let records = ledger.records(&pool).await.unwrap();
        assert_eq!(MigrationLedger::max_batch(&records), Some(2));
        assert_eq!(records[1].migration, "2024_b");
        assert_eq!(records[1].batch, 2);

        ledger.remove(&pool, "2024_b").await.unwrap();
        let names: Vec<_> = ledger
            .records(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.migration)
            .collect();
        assert_eq!(names, vec!["2024_a", "2024_c"]);
    }

    #[tokio::test]
    async fn test_scan_sets_aside_undecodable_rows() {
        let pool = MemoryPool::new();
        pool.seed_ledger("2024_good", 1);
        pool.seed_ledger("2023_bad", 0);
        let ledger = MigrationLedger::new("migrations");

        assert!(ledger.records(&pool).await.is_err());

        let (records, invalid) = ledger.scan(&pool).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].migration, "2024_good");
        assert_eq!(invalid.len(), 1);
        assert!(invalid[0].contains("2023_bad"));
    }

    #[tokio::test]
    async fn test_unavailable_ledger_is_a_migration_error() {
        let pool = MemoryPool::new();
        pool.fail_ledger_reads(true);
        let ledger = MigrationLedger::new("migrations");

        let err = ledger.records(&pool).await.unwrap_err();
        assert!(matches!(err, OrmError::Migration(_)));
    }
}
