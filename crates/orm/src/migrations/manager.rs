//! Migration Manager - Applies and reverts migrations against the ledger
//!
//! Discovers migration identifiers through a [`Loader`], diffs them against
//! the ledger, and runs `up`/`down` strictly in identifier order. Every
//! mutating entry point holds the advisory lock for its whole duration and
//! stops at the first failing step.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use super::definitions::{
    MigrationConfig, MigrationDirection, MigrationOperation, MigrationRecord, MigrationReport,
    MigrationStatus, StatusEntry, StatusReport, StepOutcome,
};
use super::ledger::MigrationLedger;
use super::lock::{LockToken, MigrationLock};
use super::unit::{Migration, Schema};
use crate::backends::{DatabaseExecutor, DatabasePool};
use crate::error::{OrmError, OrmResult};
use crate::registry::Loader;

/// Loader resolving migration identifiers
pub type MigrationLoader = dyn Loader<dyn Migration>;

/// Runs migrations and reports their state
pub struct MigrationManager {
    pool: Arc<dyn DatabasePool>,
    loader: Arc<MigrationLoader>,
    config: MigrationConfig,
    ledger: MigrationLedger,
    lock: MigrationLock,
    owner: String,
}

impl MigrationManager {
    /// Create a manager, creating the ledger and lock tables if missing
    pub async fn new(
        pool: Arc<dyn DatabasePool>,
        loader: Arc<MigrationLoader>,
        config: MigrationConfig,
    ) -> OrmResult<Self> {
        let ledger = MigrationLedger::new(config.migrations_table.clone());
        let lock = MigrationLock::new(config.lock_table());

        ledger.ensure_table(pool.as_executor()).await?;
        lock.ensure_table(pool.as_executor()).await?;

        let owner = config
            .lock_owner
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            pool,
            loader,
            config,
            ledger,
            lock,
            owner,
        })
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Owner token written to the lock table while this manager runs
    pub fn lock_owner(&self) -> &str {
        &self.owner
    }

    /// Registered identifiers, ascending and de-duplicated
    pub fn discovered(&self) -> Vec<String> {
        let mut identifiers = self.loader.identifiers();
        identifiers.sort();
        identifiers.dedup();
        identifiers
    }

    /// Applied/pending state of every discovered migration
    ///
    /// Undecodable ledger rows are reported as warnings rather than failing
    /// the call.
    pub async fn status(&self) -> OrmResult<StatusReport> {
        let (records, invalid) = self.ledger.scan(self.executor()).await?;
        let discovered = self.discovered();

        let applied: HashMap<&str, &MigrationRecord> = records
            .iter()
            .map(|record| (record.migration.as_str(), record))
            .collect();

        let entries = discovered
            .iter()
            .map(|migration| StatusEntry {
                migration: migration.clone(),
                status: match applied.get(migration.as_str()) {
                    Some(record) => MigrationStatus::Applied {
                        batch: record.batch,
                        executed_at: record.executed_at,
                    },
                    None => MigrationStatus::Pending,
                },
            })
            .collect();

        let known: HashSet<&str> = discovered.iter().map(String::as_str).collect();
        let orphaned = records
            .iter()
            .filter(|record| !known.contains(record.migration.as_str()))
            .cloned()
            .collect();

        let report = StatusReport {
            entries,
            orphaned,
            invalid,
        };
        for warning in report.warnings() {
            tracing::warn!("{}", warning);
        }
        Ok(report)
    }

    /// Apply every pending migration under one new batch
    pub async fn migrate(&self) -> OrmResult<MigrationReport> {
        let token = self.acquire_lock().await?;
        let result = self.run_migrate().await;
        self.release_lock(token, result).await
    }

    /// Revert the most recent batch
    pub async fn rollback(&self) -> OrmResult<MigrationReport> {
        let token = self.acquire_lock().await?;
        let result = self.run_rollback().await;
        self.release_lock(token, result).await
    }

    /// Revert every applied migration
    pub async fn reset(&self) -> OrmResult<MigrationReport> {
        let token = self.acquire_lock().await?;
        let result = self.run_reset(MigrationOperation::Reset).await;
        self.release_lock(token, result).await
    }

    /// Reset, then migrate again if the reset finished cleanly
    pub async fn refresh(&self) -> OrmResult<MigrationReport> {
        let token = self.acquire_lock().await?;
        let result = self.run_refresh().await;
        self.release_lock(token, result).await
    }

    /// Clear a lock left behind by a crashed runner
    pub async fn force_unlock(&self) -> OrmResult<bool> {
        if let Some((owner, acquired_at)) = self.lock.holder(self.executor()).await? {
            tracing::warn!(owner = %owner, acquired_at = %acquired_at, "force-releasing migration lock");
        }
        self.lock.force_release(self.executor()).await
    }

    fn executor(&self) -> &dyn DatabaseExecutor {
        self.pool.as_executor()
    }

    async fn acquire_lock(&self) -> OrmResult<LockToken> {
        self.lock.acquire(self.executor(), &self.owner).await
    }

    /// Release the lock; a failed release is attached to the report as a warning
    async fn release_lock(
        &self,
        token: LockToken,
        result: OrmResult<MigrationReport>,
    ) -> OrmResult<MigrationReport> {
        let released = self.lock.release(self.executor(), token).await;
        match (result, released) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(mut report), Err(e)) => {
                tracing::error!(error = %e, "failed to release migration lock");
                report
                    .warnings
                    .push(format!("{}; the lock is still held until force-unlocked", e));
                Ok(report)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                tracing::error!(error = %release_error, "failed to release migration lock");
                Err(e)
            }
        }
    }

    async fn run_migrate(&self) -> OrmResult<MigrationReport> {
        let records = self.ledger.records(self.executor()).await?;
        let applied: HashSet<&str> = records.iter().map(|r| r.migration.as_str()).collect();

        let pending: Vec<String> = self
            .discovered()
            .into_iter()
            .filter(|migration| !applied.contains(migration.as_str()))
            .collect();

        let mut report = MigrationReport::new(MigrationOperation::Migrate);
        if pending.is_empty() {
            tracing::info!("nothing to migrate");
            return Ok(report);
        }

        let batch = MigrationLedger::max_batch(&records).map_or(1, |last| last + 1);
        report.batch = Some(batch);
        tracing::info!(batch, pending = pending.len(), "running migrations");

        for migration in &pending {
            let outcome = self.run_step(migration, MigrationDirection::Up, batch).await;
            let failed = !outcome.is_success();
            report.outcomes.push(outcome);
            if failed {
                break;
            }
        }

        Ok(report)
    }

    async fn run_rollback(&self) -> OrmResult<MigrationReport> {
        let records = self.ledger.records(self.executor()).await?;
        let mut report = MigrationReport::new(MigrationOperation::Rollback);

        let Some(batch) = MigrationLedger::max_batch(&records) else {
            tracing::info!("nothing to roll back");
            return Ok(report);
        };
        report.batch = Some(batch);

        let targets = records
            .into_iter()
            .filter(|record| record.batch == batch)
            .collect();
        tracing::info!(batch, "rolling back batch");

        self.revert(targets, &mut report).await;
        Ok(report)
    }

    async fn run_reset(&self, operation: MigrationOperation) -> OrmResult<MigrationReport> {
        let records = self.ledger.records(self.executor()).await?;
        let mut report = MigrationReport::new(operation);

        if records.is_empty() {
            tracing::info!("nothing to roll back");
            return Ok(report);
        }

        tracing::info!(applied = records.len(), "rolling back all migrations");
        self.revert(records, &mut report).await;
        Ok(report)
    }

    async fn run_refresh(&self) -> OrmResult<MigrationReport> {
        let mut report = self.run_reset(MigrationOperation::Refresh).await?;
        if !report.is_success() {
            tracing::warn!("reset failed; skipping migrate");
            return Ok(report);
        }

        let migrated = self.run_migrate().await?;
        report.batch = migrated.batch;
        report.outcomes.extend(migrated.outcomes);
        Ok(report)
    }

    /// Revert `records` in descending identifier order, stopping at the first failure
    async fn revert(&self, mut records: Vec<MigrationRecord>, report: &mut MigrationReport) {
        records.sort_by(|a, b| b.migration.cmp(&a.migration));

        for record in &records {
            let outcome = self
                .run_step(&record.migration, MigrationDirection::Down, record.batch)
                .await;
            let failed = !outcome.is_success();
            report.outcomes.push(outcome);
            if failed {
                break;
            }
        }
    }

    async fn run_step(&self, migration: &str, direction: MigrationDirection, batch: i32) -> StepOutcome {
        let result = match self.loader.load(migration) {
            Ok(unit) => self.apply(migration, unit.as_ref(), direction, batch).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                match direction {
                    MigrationDirection::Up => tracing::info!(migration = %migration, batch, "migrated"),
                    MigrationDirection::Down => tracing::info!(migration = %migration, batch, "rolled back"),
                }
                StepOutcome::success(migration, direction)
            }
            Err(e) => {
                tracing::error!(migration = %migration, ?direction, error = %e, "migration step failed");
                StepOutcome::failure(migration, direction, e.to_string())
            }
        }
    }

    /// Run one unit plus its ledger mutation, inside a transaction when DDL is transactional
    async fn apply(
        &self,
        migration: &str,
        unit: &dyn Migration,
        direction: MigrationDirection,
        batch: i32,
    ) -> OrmResult<()> {
        if !self.pool.supports_transactional_ddl() {
            return self
                .execute_step(self.executor(), migration, unit, direction, batch, false)
                .await;
        }

        let tx = self.pool.begin_transaction().await?;
        let result = self
            .execute_step(tx.as_executor(), migration, unit, direction, batch, true)
            .await;

        match result {
            Ok(()) => tx.commit().await,
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!(migration = %migration, error = %rollback_error, "transaction rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn execute_step(
        &self,
        executor: &dyn DatabaseExecutor,
        migration: &str,
        unit: &dyn Migration,
        direction: MigrationDirection,
        batch: i32,
        atomic: bool,
    ) -> OrmResult<()> {
        let schema = Schema::new(executor);

        let ledger_write = match direction {
            MigrationDirection::Up => {
                unit.up(&schema).await?;
                self.ledger.record(executor, migration, batch).await
            }
            MigrationDirection::Down => {
                unit.down(&schema).await?;
                self.ledger.remove(executor, migration).await
            }
        };

        ledger_write.map_err(|e| {
            if atomic {
                return e;
            }
            let state = match direction {
                MigrationDirection::Up => "schema change was applied but is not recorded",
                MigrationDirection::Down => "schema change was reverted but is still recorded",
            };
            OrmError::Migration(format!("{}; database and ledger are inconsistent: {}", state, e))
        })
    }
}
