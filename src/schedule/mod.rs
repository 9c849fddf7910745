//! Recurring backup registration in the host job table
//!
//! Installs one cron entry that runs `create --auto` on the configured
//! schedule. Entries belonging to this tool are recognized by a marker
//! comment or by the program path; every other line in the table is left
//! untouched.

mod crontab;

pub use crontab::SystemCrontab;

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::backup::BackupManager;
use crate::config::BackupSchedule;
use crate::error::BackupResult;

/// Marker carried by the comment line above the installed entry
pub const JOB_MARKER: &str = "data-usage-backup";

/// Read/write access to a host job table
pub trait JobTable {
    /// Current table contents, `None` when the user has no table yet
    fn read(&self) -> BackupResult<Option<String>>;

    /// Replace the whole table
    fn write(&self, contents: &str) -> BackupResult<()>;
}

/// Cron expression for a schedule
pub fn cron_expression(schedule: BackupSchedule) -> &'static str {
    match schedule {
        BackupSchedule::Hourly => "0 * * * *",
        BackupSchedule::Daily => "0 2 * * *",
        BackupSchedule::Weekly => "0 2 * * 0",
        BackupSchedule::Monthly => "0 2 1 * *",
    }
}

/// Installs and removes the scheduled backup job
pub struct Scheduler<T: JobTable> {
    table: T,
    program: PathBuf,
}

impl<T: JobTable> Scheduler<T> {
    /// Create a scheduler that registers `program` in `table`
    pub fn new(table: T, program: impl Into<PathBuf>) -> Self {
        Self {
            table,
            program: program.into(),
        }
    }

    /// Get the job table
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Command line the job runs
    pub fn job_command(&self, backups: &BackupManager) -> String {
        let paths = backups.paths();
        let workdir = paths
            .db_path()
            .parent()
            .unwrap_or_else(|| Path::new("/"));

        format!(
            "cd {} && {} --db-path {} --backup-dir {} create --auto >> {} 2>&1",
            shell_quote(&workdir.to_string_lossy()),
            shell_quote(&self.program.to_string_lossy()),
            shell_quote(&paths.db_path().to_string_lossy()),
            shell_quote(&paths.backup_dir().to_string_lossy()),
            shell_quote(&paths.log_file().to_string_lossy()),
        )
    }

    /// Install the job, replacing any earlier entry of this tool
    ///
    /// On success the schedule is recorded in the config; failing to save
    /// the config only logs a warning.
    pub fn install(
        &self,
        backups: &mut BackupManager,
        schedule: BackupSchedule,
    ) -> BackupResult<String> {
        let entry = format!("{} {}", cron_expression(schedule), self.job_command(backups));

        let current = self.table.read()?.unwrap_or_default();
        let mut lines = self.foreign_lines(&current);
        lines.push(format!("# {} - {}", JOB_MARKER, schedule));
        lines.push(entry.clone());

        self.table.write(&render(&lines)).map_err(|e| {
            error!(error = %e, "Failed to setup cron job");
            e
        })?;

        info!(schedule = %schedule, "Cron job setup successfully");

        backups.config_mut().backup_schedule = schedule;
        if let Err(e) = backups.save_config() {
            warn!(error = %e, "Failed to save configuration");
        }

        Ok(entry)
    }

    /// Remove this tool's entries; returns how many lines were dropped
    pub fn remove(&self) -> BackupResult<usize> {
        let current = match self.table.read()? {
            Some(current) => current,
            None => {
                info!("No crontab found");
                return Ok(0);
            }
        };

        let kept = self.foreign_lines(&current);
        let removed = current.lines().count() - kept.len();
        if removed == 0 {
            info!("No backup cron job installed");
            return Ok(0);
        }

        self.table.write(&render(&kept)).map_err(|e| {
            error!(error = %e, "Failed to remove cron job");
            e
        })?;

        info!(removed, "Backup cron job removed successfully");
        Ok(removed)
    }

    /// Lines of the table that do not belong to this tool
    fn foreign_lines(&self, table: &str) -> Vec<String> {
        let program = self.program.to_string_lossy();
        table
            .lines()
            .filter(|line| !line.contains(JOB_MARKER) && !line.contains(program.as_ref()))
            .map(str::to_string)
            .collect()
    }
}

/// Join lines into a table; cron requires a trailing newline
fn render(lines: &[String]) -> String {
    let mut table = lines.join("\n");
    if !table.is_empty() {
        table.push('\n');
    }
    table
}

fn shell_quote(value: &str) -> String {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@".contains(c))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
