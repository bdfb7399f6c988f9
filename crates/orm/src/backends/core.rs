//! Core Database Backend Traits
//!
//! This module defines the execution-handle abstraction the migration engine
//! talks to. Managers and units only ever see these traits; the concrete
//! driver lives behind them and is owned by the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{OrmError, OrmResult};

/// Anything that can run a statement: a pool or an open transaction
#[async_trait]
pub trait DatabaseExecutor: Send + Sync {
    /// Execute a statement and return the affected row count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute a query and return all result rows
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row, if any
    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>>;
}

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: DatabaseExecutor {
    /// View this transaction as a plain executor
    fn as_executor(&self) -> &dyn DatabaseExecutor;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> OrmResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}

/// Shared execution handle passed into the managers and every unit
#[async_trait]
pub trait DatabasePool: DatabaseExecutor {
    /// View this pool as a plain executor
    fn as_executor(&self) -> &dyn DatabaseExecutor;

    /// Begin a transaction
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>>;

    /// Whether DDL issued inside a transaction is rolled back with it.
    ///
    /// MySQL commits implicitly on every DDL statement, so it reports `false`.
    fn supports_transactional_ddl(&self) -> bool {
        self.sql_dialect().supports_transactional_ddl()
    }

    /// SQL dialect spoken by this pool
    fn sql_dialect(&self) -> SqlDialect;

    /// Perform a round trip and report its latency
    async fn health_check(&self) -> OrmResult<Duration>;

    /// Close the pool
    async fn close(&self) -> OrmResult<()>;
}

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by index
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue>;

    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue>;

    /// Get column count
    fn column_count(&self) -> usize;

    /// Get column names
    fn column_names(&self) -> Vec<String>;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Integer view of the value; numeric strings are accepted because some
    /// drivers hand back aggregates as text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(i64::from(*i)),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::Bool(b) => Some(i64::from(*b)),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp view of the value
    pub fn as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            DatabaseValue::DateTime(dt) => Some(*dt),
            DatabaseValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
            _ => None,
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<chrono::NaiveDate> for DatabaseValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// MySQL and MariaDB
    MySQL,
}

impl SqlDialect {
    /// Check if DDL participates in transactions for this dialect
    pub fn supports_transactional_ddl(&self) -> bool {
        match self {
            SqlDialect::MySQL => false,
        }
    }
}

/// Database backend trait that provides database-specific implementations
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Create a connection pool from a database URL
    async fn create_pool(&self, database_url: &str, config: DatabasePoolConfig) -> OrmResult<Arc<dyn DatabasePool>>;

    /// Get the SQL dialect used by this backend
    fn sql_dialect(&self) -> SqlDialect;

    /// Validate a database URL for this backend
    fn validate_database_url(&self, url: &str) -> OrmResult<()>;

    /// Parse connection parameters from a database URL
    fn parse_database_url(&self, url: &str) -> OrmResult<DatabaseConnectionConfig>;
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
            test_before_acquire: true,
        }
    }
}

/// Database connection configuration parsed from URL
#[derive(Debug, Clone)]
pub struct DatabaseConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub additional_params: HashMap<String, String>,
}

/// Read a required column, mapping absence to a migration error
pub(crate) fn required_column(row: &dyn DatabaseRow, name: &str) -> OrmResult<DatabaseValue> {
    let value = row.get_by_name(name)?;
    if value.is_null() {
        return Err(OrmError::Migration(format!("Column '{}' is unexpectedly NULL", name)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_views() {
        assert_eq!(DatabaseValue::Int32(3).as_i64(), Some(3));
        assert_eq!(DatabaseValue::String(" 7 ".into()).as_i64(), Some(7));
        assert_eq!(DatabaseValue::Null.as_i64(), None);
        assert_eq!(DatabaseValue::from("users").as_str(), Some("users"));
        assert_eq!(DatabaseValue::from(Option::<i32>::None), DatabaseValue::Null);
    }

    #[test]
    fn test_datetime_parsing_from_text() {
        let value = DatabaseValue::String("2024-01-01 12:30:00".to_string());
        let parsed = value.as_datetime().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T12:30:00+00:00");

        let value = DatabaseValue::String("2024-01-01T12:30:00Z".to_string());
        assert!(value.as_datetime().is_some());
    }

    #[test]
    fn test_dialect_capabilities() {
        assert!(!SqlDialect::MySQL.supports_transactional_ddl());
    }
}
