//! Migration Definitions - Core types and structures for migrations
//!
//! Ledger records, configuration, and the report shapes returned by the
//! manager's entry points.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the migrations ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration identifier
    pub migration: String,
    /// Batch number (for grouping migrations)
    pub batch: i32,
    /// When the migration was applied
    pub executed_at: Option<DateTime<Utc>>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Table name for tracking migrations
    pub migrations_table: String,
    /// Identifies this runner in the lock table
    pub lock_owner: Option<String>,
}

impl MigrationConfig {
    /// Name of the single-row lock table paired with the ledger
    pub fn lock_table(&self) -> String {
        format!("{}_lock", self.migrations_table)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_table: "migrations".to_string(),
            lock_owner: None,
        }
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationDirection {
    /// Apply the migration (run `up`)
    Up,
    /// Rollback the migration (run `down`)
    Down,
}

/// Entry point that produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationOperation {
    Migrate,
    Rollback,
    Reset,
    Refresh,
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationOperation::Migrate => "migrate",
            MigrationOperation::Rollback => "rollback",
            MigrationOperation::Reset => "reset",
            MigrationOperation::Refresh => "refresh",
        };
        f.write_str(name)
    }
}

/// Outcome of one attempted migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub migration: String,
    pub direction: MigrationDirection,
    /// `None` on success, the failure message otherwise
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn success(migration: &str, direction: MigrationDirection) -> Self {
        Self {
            migration: migration.to_string(),
            direction,
            error: None,
        }
    }

    pub fn failure(migration: &str, direction: MigrationDirection, error: impl Into<String>) -> Self {
        Self {
            migration: migration.to_string(),
            direction,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, self.direction) {
            (None, MigrationDirection::Up) => write!(f, "✓ Migrated: {}", self.migration),
            (None, MigrationDirection::Down) => write!(f, "✓ Rolled back: {}", self.migration),
            (Some(error), MigrationDirection::Up) => {
                write!(f, "✗ Failed to migrate {}: {}", self.migration, error)
            }
            (Some(error), MigrationDirection::Down) => {
                write!(f, "✗ Failed to roll back {}: {}", self.migration, error)
            }
        }
    }
}

/// Result of `migrate`, `rollback`, `reset` or `refresh`
///
/// Outcomes are in execution order and end at the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub operation: MigrationOperation,
    /// Batch allocated by `migrate`, or the batch reverted by `rollback`
    pub batch: Option<i32>,
    pub outcomes: Vec<StepOutcome>,
    /// Problems after the steps finished, such as a lock that could not be released
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl MigrationReport {
    pub fn new(operation: MigrationOperation) -> Self {
        Self {
            operation,
            batch: None,
            outcomes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Nothing was attempted
    pub fn is_noop(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// The step that halted the run, if any
    pub fn failure(&self) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|outcome| !outcome.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    /// Identifiers that completed successfully, in execution order
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(|outcome| outcome.migration.as_str())
            .collect()
    }

    /// Human-readable lines, one per attempted migration, then any warnings
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = if self.is_noop() {
            let message = match self.operation {
                MigrationOperation::Migrate | MigrationOperation::Refresh => "Nothing to migrate.",
                MigrationOperation::Rollback | MigrationOperation::Reset => "Nothing to roll back.",
            };
            vec![message.to_string()]
        } else {
            self.outcomes.iter().map(|outcome| outcome.to_string()).collect()
        };
        lines.extend(self.warnings.iter().map(|warning| format!("Warning: {}", warning)));
        lines
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        batch: i32,
        executed_at: Option<DateTime<Utc>>,
    },
}

impl MigrationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Applied { .. } => "applied",
        }
    }

    pub fn batch(&self) -> Option<i32> {
        match self {
            MigrationStatus::Pending => None,
            MigrationStatus::Applied { batch, .. } => Some(*batch),
        }
    }
}

/// Status of one discovered migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub migration: String,
    pub status: MigrationStatus,
}

/// Result of `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// One entry per discovered migration, ascending
    pub entries: Vec<StatusEntry>,
    /// Ledger rows whose identifier is not registered
    pub orphaned: Vec<MigrationRecord>,
    /// Ledger rows that could not be decoded, described
    #[serde(default)]
    pub invalid: Vec<String>,
}

impl StatusReport {
    pub fn applied(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.status, MigrationStatus::Applied { .. }))
    }

    pub fn pending(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.status == MigrationStatus::Pending)
    }

    pub fn warnings(&self) -> Vec<String> {
        let orphaned = self.orphaned.iter().map(|record| {
            format!(
                "Migration {} (batch {}) is recorded as applied but is not registered",
                record.migration, record.batch
            )
        });
        let invalid = self
            .invalid
            .iter()
            .map(|problem| format!("Ignored unreadable ledger row: {}", problem));
        orphaned.chain(invalid).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lines() {
        let mut report = MigrationReport::new(MigrationOperation::Migrate);
        assert!(report.is_noop());
        assert_eq!(report.lines(), vec!["Nothing to migrate.".to_string()]);

        report.outcomes.push(StepOutcome::success("2024_a", MigrationDirection::Up));
        report.outcomes.push(StepOutcome::failure("2024_b", MigrationDirection::Up, "boom"));

        assert_eq!(
            report.lines(),
            vec![
                "✓ Migrated: 2024_a".to_string(),
                "✗ Failed to migrate 2024_b: boom".to_string(),
            ]
        );
        assert_eq!(report.succeeded(), vec!["2024_a"]);
        assert_eq!(report.failure().map(|o| o.migration.as_str()), Some("2024_b"));
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_warnings_follow_outcomes() {
        let mut report = MigrationReport::new(MigrationOperation::Migrate);
        report.outcomes.push(StepOutcome::success("2024_a", MigrationDirection::Up));
        report.warnings.push("lock still held".to_string());

        assert_eq!(report.lines(), vec!["✓ Migrated: 2024_a", "Warning: lock still held"]);
        assert!(report.is_success());
    }

    #[test]
    fn test_rollback_noop_message() {
        let report = MigrationReport::new(MigrationOperation::Reset);
        assert_eq!(report.to_string(), "Nothing to roll back.");
    }

    #[test]
    fn test_status_labels() {
        let applied = MigrationStatus::Applied {
            batch: 2,
            executed_at: None,
        };
        assert_eq!(applied.label(), "applied");
        assert_eq!(applied.batch(), Some(2));
        assert_eq!(MigrationStatus::Pending.label(), "pending");
        assert_eq!(MigrationStatus::Pending.batch(), None);
    }

    #[test]
    fn test_lock_table_name() {
        let config = MigrationConfig::default();
        assert_eq!(config.lock_table(), "migrations_lock");
    }
}
