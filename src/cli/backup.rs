//! Backup CLI commands
//!
//! Implements CLI commands for backup management.

use chrono::Local;
use clap::Subcommand;
use tracing::warn;

use crate::backup::{metadata, BackupManager, RestoreManager};
use crate::config::{BackupPaths, BackupSchedule};
use crate::display;
use crate::error::{BackupError, BackupResult};
use crate::schedule::{Scheduler, SystemCrontab};

/// Keyword accepted in place of an artifact name
const LATEST: &str = "latest";

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Label used in place of the default artifact prefix
        #[arg(short, long)]
        name: Option<String>,

        /// Automatic mode (for scheduled runs): log only, no console summary
        #[arg(long)]
        auto: bool,
    },

    /// Restore the live database from a backup
    Restore {
        /// Backup filename (use 'latest' for most recent)
        backup: String,

        /// Confirm overwriting the live database
        #[arg(long)]
        confirm: bool,
    },

    /// List all available backups
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check the integrity of a backup
    Verify {
        /// Backup filename (use 'latest' for most recent)
        backup: String,
    },

    /// Delete old backups according to retention policy
    Cleanup,

    /// Register a recurring backup in the user's crontab
    InstallSchedule {
        /// How often the backup runs
        #[arg(value_enum)]
        period: BackupSchedule,
    },

    /// Remove the recurring backup from the user's crontab
    RemoveSchedule,

    /// Show current configuration and paths
    ShowConfig,
}

/// Handle a backup command
pub fn handle_backup_command(paths: BackupPaths, cmd: BackupCommands) -> BackupResult<()> {
    let mut manager = BackupManager::open(paths)?;

    match cmd {
        BackupCommands::Create { name, auto } => {
            let report = manager.create_backup(name.as_deref())?;
            if !auto {
                print!("{}", display::format_backup_report(&report));
            }
        }

        BackupCommands::Restore { backup, confirm } => {
            let filename = resolve_backup_name(&manager, &backup)?;
            let restore_manager = RestoreManager::new(&manager);

            if !confirm {
                println!("WARNING: This will overwrite the database at {}", manager.paths().db_path().display());
                println!("To proceed, run again with --confirm:");
                println!("  usage-backup restore {} --confirm", filename);
            }

            let report = restore_manager.restore(&filename, confirm)?;
            print!("{}", display::format_restore_report(&report));
        }

        BackupCommands::List { verbose } => {
            let backups = manager.list_backups()?;
            print!("{}", display::format_backup_list(&backups, verbose, Local::now()));

            if verbose && manager.paths().db_path().exists() {
                match metadata::read_status(manager.paths().db_path()) {
                    Ok(status) => {
                        println!();
                        print!("{}", display::format_status(&status));
                    }
                    Err(e) => warn!(error = %e, "Could not read backup status from database"),
                }
            }
        }

        BackupCommands::Verify { backup } => {
            let filename = resolve_backup_name(&manager, &backup)?;
            let report = RestoreManager::new(&manager).verify_backup(&filename)?;
            print!("{}", display::format_verify_report(&report));
        }

        BackupCommands::Cleanup => {
            let report = manager.cleanup();
            print!("{}", display::format_cleanup_report(&report));
        }

        BackupCommands::InstallSchedule { period } => {
            let scheduler = Scheduler::new(SystemCrontab::new(), current_program()?);
            let entry = scheduler.install(&mut manager, period)?;
            println!("Installed {} backup schedule:", period);
            println!("  {}", entry);
        }

        BackupCommands::RemoveSchedule => {
            let scheduler = Scheduler::new(SystemCrontab::new(), current_program()?);
            if scheduler.remove()? == 0 {
                println!("No backup schedule installed.");
            } else {
                println!("Backup schedule removed.");
            }
        }

        BackupCommands::ShowConfig => {
            let paths = manager.paths();
            println!("Backup Configuration");
            println!("====================");
            println!("Database:         {}", paths.db_path().display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!("Config file:      {}", paths.config_file().display());
            println!("Log file:         {}", paths.log_file().display());
            println!();
            print!("{}", display::format_config(manager.config()));
        }
    }

    Ok(())
}

/// Resolve a backup identifier to an artifact filename
fn resolve_backup_name(manager: &BackupManager, backup: &str) -> BackupResult<String> {
    if backup.eq_ignore_ascii_case(LATEST) {
        return manager
            .store()
            .latest()?
            .map(|b| b.filename)
            .ok_or_else(|| BackupError::ArtifactMissing(LATEST.to_string()));
    }

    Ok(backup.to_string())
}

/// Absolute path of the running executable, as recorded in the crontab
fn current_program() -> BackupResult<std::path::PathBuf> {
    std::env::current_exe().map_err(|e| {
        BackupError::ScheduleInstallFailed(format!("cannot locate executable: {}", e))
    })
}
