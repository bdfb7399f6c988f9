//! Seeder contract with environment controls

use std::fmt;

use async_trait::async_trait;

use crate::backends::{DatabaseExecutor, DatabaseValue};
use crate::error::{OrmError, OrmResult};
use crate::migrations::schema_builder::quote_identifier;

/// Environment types for seeding control
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
    Custom(String),
}

impl Environment {
    /// Parse environment from string
    pub fn from_name(env: &str) -> Self {
        match env.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            "testing" | "test" => Environment::Testing,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            custom => Environment::Custom(custom.to_string()),
        }
    }

    /// Get environment name as string
    pub fn as_str(&self) -> &str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Custom(name) => name,
        }
    }

    /// Check if this is a safe environment for seeding
    pub fn is_safe_for_seeding(&self) -> bool {
        match self {
            Environment::Development | Environment::Testing | Environment::Staging => true,
            Environment::Production | Environment::Custom(_) => false,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named data-population unit
///
/// Seeders keep no ledger. Re-running one is the caller's decision, so a
/// seeder that must be repeatable should clear its tables first.
#[async_trait]
pub trait Seeder: Send + Sync {
    /// Run the seeder
    async fn run(&self, ctx: &SeedContext<'_>) -> OrmResult<()>;
}

/// Statement helpers available to seeders
pub struct SeedContext<'a> {
    executor: &'a dyn DatabaseExecutor,
}

impl<'a> SeedContext<'a> {
    pub fn new(executor: &'a dyn DatabaseExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &'a dyn DatabaseExecutor {
        self.executor
    }

    pub async fn execute(&self, sql: &str) -> OrmResult<u64> {
        self.executor.execute(sql, &[]).await
    }

    /// Insert one row given as `(column, value)` pairs
    pub async fn insert(&self, table: &str, row: &[(&str, DatabaseValue)]) -> OrmResult<u64> {
        let columns: Vec<&str> = row.iter().map(|(column, _)| *column).collect();
        let sql = insert_sql(table, &columns, 1)?;
        let params: Vec<DatabaseValue> = row.iter().map(|(_, value)| value.clone()).collect();
        self.executor.execute(&sql, &params).await
    }

    /// Insert several rows in one statement; every row must list the same columns
    pub async fn insert_many(&self, table: &str, rows: &[Vec<(&str, DatabaseValue)>]) -> OrmResult<u64> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };

        let columns: Vec<&str> = first.iter().map(|(column, _)| *column).collect();
        let mut params = Vec::with_capacity(columns.len() * rows.len());

        for (index, row) in rows.iter().enumerate() {
            let row_columns: Vec<&str> = row.iter().map(|(column, _)| *column).collect();
            if row_columns != columns {
                return Err(OrmError::Validation(format!(
                    "Row {} for table '{}' has columns {:?}, expected {:?}",
                    index, table, row_columns, columns
                )));
            }
            params.extend(row.iter().map(|(_, value)| value.clone()));
        }

        let sql = insert_sql(table, &columns, rows.len())?;
        self.executor.execute(&sql, &params).await
    }

    pub async fn truncate(&self, table: &str) -> OrmResult<()> {
        self.execute(&format!("TRUNCATE TABLE {}", quote_identifier(table)))
            .await?;
        Ok(())
    }

    /// Delete rows matching the raw `where_clause`, or every row when `None`
    pub async fn delete(&self, table: &str, where_clause: Option<&str>) -> OrmResult<u64> {
        let mut sql = format!("DELETE FROM {}", quote_identifier(table));
        if let Some(condition) = where_clause.filter(|c| !c.trim().is_empty()) {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        self.execute(&sql).await
    }
}

/// `INSERT INTO` with one `(?, ...)` group per row
pub(crate) fn insert_sql(table: &str, columns: &[&str], rows: usize) -> OrmResult<String> {
    if columns.is_empty() || rows == 0 {
        return Err(OrmError::Validation(format!(
            "Insert into '{}' needs at least one column and one row",
            table
        )));
    }

    let column_list = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let group = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![group; rows].join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_identifier(table),
        column_list,
        values
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryPool;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_name("development"), Environment::Development);
        assert_eq!(Environment::from_name("dev"), Environment::Development);
        assert_eq!(Environment::from_name("Testing"), Environment::Testing);
        assert_eq!(Environment::from_name("prod"), Environment::Production);
        assert_eq!(
            Environment::from_name("qa-east"),
            Environment::Custom("qa-east".to_string())
        );
        assert_eq!(Environment::Staging.to_string(), "staging");
    }

    #[test]
    fn test_environment_safety() {
        assert!(Environment::Development.is_safe_for_seeding());
        assert!(Environment::Testing.is_safe_for_seeding());
        assert!(Environment::Staging.is_safe_for_seeding());
        assert!(!Environment::Production.is_safe_for_seeding());
        assert!(!Environment::Custom("custom".to_string()).is_safe_for_seeding());
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_sql("users", &["name", "email"], 2).unwrap(),
            "INSERT INTO `users` (`name`, `email`) VALUES (?, ?), (?, ?)"
        );
        assert!(insert_sql("users", &[], 1).is_err());
    }

    #[tokio::test]
    async fn test_context_helpers() {
        let pool = MemoryPool::new();
        let ctx = SeedContext::new(&pool);

        ctx.truncate("users").await.unwrap();
        ctx.insert("users", &[("name", "Ana".into()), ("active", true.into())])
            .await
            .unwrap();
        ctx.delete("users", Some("active = 0")).await.unwrap();
        ctx.delete("users", None).await.unwrap();

        assert_eq!(
            pool.statements(),
            vec![
                "TRUNCATE TABLE `users`",
                "INSERT INTO `users` (`name`, `active`) VALUES (?, ?)",
                "DELETE FROM `users` WHERE active = 0",
                "DELETE FROM `users`",
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_many_requires_matching_columns() {
        let pool = MemoryPool::new();
        let ctx = SeedContext::new(&pool);

        assert_eq!(ctx.insert_many("users", &[]).await.unwrap(), 0);

        let rows = vec![
            vec![("name", DatabaseValue::from("a"))],
            vec![("email", DatabaseValue::from("b"))],
        ];
        let err = ctx.insert_many("users", &rows).await.unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
        assert!(pool.statements().is_empty());
    }
}
