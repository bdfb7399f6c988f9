use anyhow::Result;
use plinth_orm::{MigrationManager, MigrationReport, MigrationStatus, StatusReport};

/// Apply pending migrations
pub async fn run(manager: &MigrationManager) -> Result<bool> {
    Ok(print_report(&manager.migrate().await?))
}

/// Revert the last batch
pub async fn rollback(manager: &MigrationManager) -> Result<bool> {
    Ok(print_report(&manager.rollback().await?))
}

pub async fn reset(manager: &MigrationManager) -> Result<bool> {
    Ok(print_report(&manager.reset().await?))
}

pub async fn refresh(manager: &MigrationManager) -> Result<bool> {
    Ok(print_report(&manager.refresh().await?))
}

pub async fn status(manager: &MigrationManager) -> Result<bool> {
    let report = manager.status().await?;
    for line in status_lines(&report) {
        println!("{}", line);
    }
    Ok(true)
}

/// Clear a lock left by a runner that died mid-run
pub async fn unlock(manager: &MigrationManager) -> Result<bool> {
    if manager.force_unlock().await? {
        println!("✓ Migration lock released.");
    } else {
        println!("Migration lock was not held.");
    }
    Ok(true)
}

/// Lock owner recorded for this process: `plinth@<host>:<pid>`
pub fn runner_name() -> String {
    let host = ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| "localhost".to_string());
    format!("plinth@{}:{}", host.trim(), std::process::id())
}

/// Print the report; a warning such as an unreleased lock also fails the command
fn print_report(report: &MigrationReport) -> bool {
    for line in report.lines() {
        println!("{}", line);
    }
    report.is_success() && report.warnings.is_empty()
}

pub fn status_lines(report: &StatusReport) -> Vec<String> {
    if report.entries.is_empty() && report.orphaned.is_empty() && report.invalid.is_empty() {
        return vec!["No migrations found.".to_string()];
    }

    let mut lines = vec!["Migration status:".to_string()];
    for entry in &report.entries {
        lines.push(match &entry.status {
            MigrationStatus::Applied { batch, .. } => {
                format!("  {} - {} (batch {})", entry.migration, entry.status.label(), batch)
            }
            MigrationStatus::Pending => format!("  {} - {}", entry.migration, entry.status.label()),
        });
    }
    for warning in report.warnings() {
        lines.push(format!("Warning: {}", warning));
    }
    lines
}
