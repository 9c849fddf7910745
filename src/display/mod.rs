//! Display formatting for terminal output
//!
//! Provides utilities for formatting archive listings and operation
//! results for terminal display.

pub mod backup;

pub use backup::{
    format_backup_list, format_backup_report, format_cleanup_report, format_config,
    format_restore_report, format_status, format_verify_report,
};
