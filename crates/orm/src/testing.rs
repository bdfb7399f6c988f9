//! In-memory execution handle for tests
//!
//! [`MemoryPool`] understands the statements the migration ledger and lock
//! issue and keeps their rows in memory. Every other statement is recorded
//! and succeeds unless it matches a pattern registered with
//! [`MemoryPool::fail_on`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backends::{
    DatabaseExecutor, DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue, SqlDialect,
};
use crate::error::{OrmError, OrmResult};
use crate::migrations::ledger::MigrationLedger;
use crate::migrations::lock::MigrationLock;

#[derive(Debug, Clone)]
struct LedgerRow {
    id: i64,
    migration: String,
    batch: i32,
    executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct LockRow {
    owner: String,
    acquired_at: DateTime<Utc>,
}

#[derive(Debug)]
struct MemoryState {
    ledger: MigrationLedger,
    lock: MigrationLock,
    rows: Vec<LedgerRow>,
    next_id: i64,
    lock_row: Option<LockRow>,
    statements: Vec<String>,
    fail_patterns: Vec<String>,
    fail_ledger_reads: bool,
    fail_ledger_writes: bool,
    transactional_ddl: bool,
    commits: usize,
    rollbacks: usize,
}

impl MemoryState {
    fn apply(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<MemoryRow>> {
        self.statements.push(sql.to_string());

        if let Some(pattern) = self.fail_patterns.iter().find(|p| sql.contains(p.as_str())) {
            return Err(OrmError::Query(format!("simulated failure on '{}'", pattern)));
        }

        if sql == self.ledger.select_records_sql() {
            if self.fail_ledger_reads {
                return Err(OrmError::Connection("ledger unavailable".to_string()));
            }
            return Ok(self.rows.iter().map(MemoryRow::from_ledger).collect());
        }

        if sql == self.ledger.insert_record_sql() {
            if self.fail_ledger_writes {
                return Err(OrmError::Query("ledger is read-only".to_string()));
            }
            let migration = text_param(params, 0)?;
            let batch = params
                .get(1)
                .and_then(DatabaseValue::as_i64)
                .and_then(|b| i32::try_from(b).ok())
                .ok_or_else(|| OrmError::Query("batch parameter missing".to_string()))?;
            self.next_id += 1;
            self.rows.push(LedgerRow {
                id: self.next_id,
                migration,
                batch,
                executed_at: Utc::now(),
            });
            return Ok(vec![MemoryRow::affected(1)]);
        }

        if sql == self.ledger.delete_record_sql() {
            if self.fail_ledger_writes {
                return Err(OrmError::Query("ledger is read-only".to_string()));
            }
            let migration = text_param(params, 0)?;
            let before = self.rows.len();
            self.rows.retain(|row| row.migration != migration);
            return Ok(vec![MemoryRow::affected(before - self.rows.len())]);
        }

        if sql == self.lock.acquire_sql() {
            if self.lock_row.is_some() {
                return Err(OrmError::Query("Duplicate entry '1' for key 'PRIMARY'".to_string()));
            }
            self.lock_row = Some(LockRow {
                owner: text_param(params, 0)?,
                acquired_at: Utc::now(),
            });
            return Ok(vec![MemoryRow::affected(1)]);
        }

        if sql == self.lock.holder_sql() {
            return Ok(self.lock_row.iter().map(MemoryRow::from_lock).collect());
        }

        if sql == self.lock.release_sql() {
            let owner = text_param(params, 0)?;
            let held = self.lock_row.as_ref().is_some_and(|row| row.owner == owner);
            if held {
                self.lock_row = None;
            }
            return Ok(vec![MemoryRow::affected(usize::from(held))]);
        }

        if sql == self.lock.force_release_sql() {
            let held = self.lock_row.take().is_some();
            return Ok(vec![MemoryRow::affected(usize::from(held))]);
        }

        Ok(vec![MemoryRow::affected(0)])
    }
}

fn text_param(params: &[DatabaseValue], index: usize) -> OrmResult<String> {
    params
        .get(index)
        .and_then(DatabaseValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| OrmError::Query(format!("text parameter {} missing", index)))
}

/// Shared in-memory database; clones observe the same state
#[derive(Debug, Clone)]
pub struct MemoryPool {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPool {
    /// Pool whose ledger table is `migrations`
    pub fn new() -> Self {
        Self::with_ledger_table("migrations")
    }

    pub fn with_ledger_table(table: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                ledger: MigrationLedger::new(table),
                lock: MigrationLock::new(format!("{}_lock", table)),
                rows: Vec::new(),
                next_id: 0,
                lock_row: None,
                statements: Vec::new(),
                fail_patterns: Vec::new(),
                fail_ledger_reads: false,
                fail_ledger_writes: false,
                transactional_ddl: false,
                commits: 0,
                rollbacks: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report transactional DDL support, enabling per-step transactions
    pub fn with_transactional_ddl(self, enabled: bool) -> Self {
        self.state().transactional_ddl = enabled;
        self
    }

    /// Fail every statement containing `pattern`
    pub fn fail_on(&self, pattern: &str) {
        self.state().fail_patterns.push(pattern.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_patterns.clear();
        state.fail_ledger_reads = false;
        state.fail_ledger_writes = false;
    }

    pub fn fail_ledger_reads(&self, fail: bool) {
        self.state().fail_ledger_reads = fail;
    }

    pub fn fail_ledger_writes(&self, fail: bool) {
        self.state().fail_ledger_writes = fail;
    }

    /// Insert a ledger row directly, bypassing the manager
    pub fn seed_ledger(&self, migration: &str, batch: i32) {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.rows.push(LedgerRow {
            id,
            migration: migration.to_string(),
            batch,
            executed_at: Utc::now(),
        });
    }

    /// `(migration, batch)` for every ledger row, in insertion order
    pub fn ledger_rows(&self) -> Vec<(String, i32)> {
        let mut rows = self.state().rows.clone();
        rows.sort_by_key(|row| row.id);
        rows.into_iter().map(|row| (row.migration, row.batch)).collect()
    }

    pub fn lock_holder(&self) -> Option<String> {
        self.state().lock_row.as_ref().map(|row| row.owner.clone())
    }

    /// Take the lock as `owner`, as a concurrent runner would
    pub fn hold_lock(&self, owner: &str) {
        self.state().lock_row = Some(LockRow {
            owner: owner.to_string(),
            acquired_at: Utc::now(),
        });
    }

    /// Every statement executed so far, including rolled-back ones
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    /// Executed statements containing `needle`
    pub fn statements_matching(&self, needle: &str) -> Vec<String> {
        self.state()
            .statements
            .iter()
            .filter(|sql| sql.contains(needle))
            .cloned()
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.state().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state().rollbacks
    }

    fn run(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<MemoryRow>> {
        self.state().apply(sql, params)
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

fn affected_rows(rows: Vec<MemoryRow>) -> u64 {
    rows.first().and_then(|row| row.affected).unwrap_or(0)
}

fn result_rows(rows: Vec<MemoryRow>) -> Vec<Box<dyn DatabaseRow>> {
    rows.into_iter()
        .filter(|row| row.affected.is_none())
        .map(|row| Box::new(row) as Box<dyn DatabaseRow>)
        .collect()
}

#[async_trait]
impl DatabaseExecutor for MemoryPool {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        self.run(sql, params).map(affected_rows)
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        self.run(sql, params).map(result_rows)
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        Ok(self.run(sql, params).map(result_rows)?.into_iter().next())
    }
}

#[async_trait]
impl DatabasePool for MemoryPool {
    fn as_executor(&self) -> &dyn DatabaseExecutor {
        self
    }

    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>> {
        let state = self.state();
        let snapshot = (state.rows.clone(), state.next_id, state.lock_row.clone());
        drop(state);
        Ok(Box::new(MemoryTransaction {
            pool: self.clone(),
            snapshot,
        }))
    }

    fn supports_transactional_ddl(&self) -> bool {
        self.state().transactional_ddl
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::MySQL
    }

    async fn health_check(&self) -> OrmResult<Duration> {
        Ok(Duration::from_millis(0))
    }

    async fn close(&self) -> OrmResult<()> {
        Ok(())
    }
}

/// Transaction over a [`MemoryPool`]; rollback restores ledger and lock rows
struct MemoryTransaction {
    pool: MemoryPool,
    snapshot: (Vec<LedgerRow>, i64, Option<LockRow>),
}

#[async_trait]
impl DatabaseExecutor for MemoryTransaction {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        self.pool.run(sql, params).map(affected_rows)
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        self.pool.run(sql, params).map(result_rows)
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        Ok(self.pool.run(sql, params).map(result_rows)?.into_iter().next())
    }
}

#[async_trait]
impl DatabaseTransaction for MemoryTransaction {
    fn as_executor(&self) -> &dyn DatabaseExecutor {
        self
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.pool.state().commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        let (rows, next_id, lock_row) = self.snapshot;
        let mut state = self.pool.state();
        state.rows = rows;
        state.next_id = next_id;
        state.lock_row = lock_row;
        state.rollbacks += 1;
        Ok(())
    }
}

/// Result row, or an affected-row count for statements without results
#[derive(Debug, Clone)]
struct MemoryRow {
    columns: Vec<(String, DatabaseValue)>,
    affected: Option<u64>,
}

impl MemoryRow {
    fn affected(count: usize) -> Self {
        Self {
            columns: Vec::new(),
            affected: Some(count as u64),
        }
    }

    fn from_ledger(row: &LedgerRow) -> Self {
        Self {
            columns: vec![
                ("migration".to_string(), DatabaseValue::from(row.migration.as_str())),
                ("batch".to_string(), DatabaseValue::from(row.batch)),
                ("executed_at".to_string(), DatabaseValue::from(row.executed_at)),
            ],
            affected: None,
        }
    }

    fn from_lock(row: &LockRow) -> Self {
        Self {
            columns: vec![
                ("owner".to_string(), DatabaseValue::from(row.owner.as_str())),
                ("acquired_at".to_string(), DatabaseValue::from(row.acquired_at)),
            ],
            affected: None,
        }
    }
}

impl DatabaseRow for MemoryRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        self.columns
            .get(index)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| OrmError::Query(format!("Column index {} out of bounds", index)))
    }

    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| OrmError::Query(format!("Column '{}' not found", name)))
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }
}
