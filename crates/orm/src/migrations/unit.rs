//! Migration unit contract
//!
//! A migration is a pair of `up`/`down` operations. Both receive a [`Schema`]
//! bound to whatever executor the manager chose for that step (the pool, or a
//! transaction on backends with transactional DDL).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::schema_builder::{quote_identifier, Blueprint};
use crate::backends::{DatabaseExecutor, DatabaseValue};
use crate::error::OrmResult;

/// A versioned, reversible schema change
#[async_trait]
pub trait Migration: Send + Sync {
    /// Apply the change
    async fn up(&self, schema: &Schema<'_>) -> OrmResult<()>;

    /// Undo the change
    async fn down(&self, schema: &Schema<'_>) -> OrmResult<()>;
}

/// Statement helpers available to migrations
pub struct Schema<'a> {
    executor: &'a dyn DatabaseExecutor,
}

impl<'a> Schema<'a> {
    pub fn new(executor: &'a dyn DatabaseExecutor) -> Self {
        Self { executor }
    }

    /// Underlying executor, for queries the helpers do not cover
    pub fn executor(&self) -> &'a dyn DatabaseExecutor {
        self.executor
    }

    /// Run a raw statement
    pub async fn execute(&self, sql: &str) -> OrmResult<u64> {
        tracing::debug!(sql = %sql, "executing migration statement");
        self.executor.execute(sql, &[]).await
    }

    /// Run a parameterized statement
    pub async fn execute_with(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        tracing::debug!(sql = %sql, params = params.len(), "executing migration statement");
        self.executor.execute(sql, params).await
    }

    /// Build a table definition with `define` and create it if missing
    pub async fn create_table<F>(&self, table: &str, define: F) -> OrmResult<()>
    where
        F: FnOnce(&mut Blueprint) + Send,
    {
        let mut blueprint = Blueprint::new(table);
        define(&mut blueprint);
        self.execute(&blueprint.to_sql()).await?;
        Ok(())
    }

    pub async fn drop_table(&self, table: &str) -> OrmResult<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table)))
            .await?;
        Ok(())
    }

    pub async fn rename_table(&self, from: &str, to: &str) -> OrmResult<()> {
        self.execute(&format!(
            "RENAME TABLE {} TO {}",
            quote_identifier(from),
            quote_identifier(to)
        ))
        .await?;
        Ok(())
    }

    /// Add a column; `definition` is the raw type and constraints
    pub async fn add_column(&self, table: &str, column: &str, definition: &str) -> OrmResult<()> {
        self.execute(&format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_identifier(table),
            quote_identifier(column),
            definition
        ))
        .await?;
        Ok(())
    }

    pub async fn drop_column(&self, table: &str, column: &str) -> OrmResult<()> {
        self.execute(&format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_identifier(table),
            quote_identifier(column)
        ))
        .await?;
        Ok(())
    }
}

/// Build a sortable identifier: `YYYY_MM_DD_HHMMSS_snake_case_name`
pub fn migration_identifier(name: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.format("%Y_%m_%d_%H%M%S"), snake_case(name))
}

/// Lower-case `name`, turning every run of non-alphanumerics into one `_`
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_lower = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && previous_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            previous_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            previous_lower = false;
        }
    }

    out.trim_end_matches('_').to_string()
}
