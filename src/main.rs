use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use usage_backup::cli::{handle_backup_command, BackupCommands};
use usage_backup::config::paths::{DEFAULT_BACKUP_DIR, DEFAULT_DB_FILE};
use usage_backup::config::BackupPaths;
use usage_backup::{logging, BackupError};

#[derive(Parser)]
#[command(
    name = "usage-backup",
    version,
    about = "Backup manager for the data usage monitor database",
    long_about = "Creates, lists, verifies and restores compressed snapshots of the \
                  data usage SQLite database, prunes old snapshots and manages a \
                  recurring backup job in the user's crontab."
)]
struct Cli {
    /// Live database file
    #[arg(long, global = true, env = "USAGE_BACKUP_DB", default_value = DEFAULT_DB_FILE)]
    db_path: PathBuf,

    /// Directory holding backups, the config file and the log
    #[arg(long, global = true, env = "USAGE_BACKUP_DIR", default_value = DEFAULT_BACKUP_DIR)]
    backup_dir: PathBuf,

    #[command(subcommand)]
    command: BackupCommands,
}

fn run(cli: Cli) -> Result<()> {
    let paths = BackupPaths::new(&cli.db_path, &cli.backup_dir)?;
    let scheduled = matches!(cli.command, BackupCommands::Create { auto: true, .. });
    let _log_guard = logging::init_logging(paths.backup_dir(), !scheduled);

    handle_backup_command(paths, cli.command)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            let code = e
                .downcast_ref::<BackupError>()
                .map_or(1, BackupError::exit_code);
            ExitCode::from(code as u8)
        }
    }
}
