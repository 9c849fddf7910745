//! The user's crontab, driven through the `crontab` program

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use super::JobTable;
use crate::error::{BackupError, BackupResult};

/// Job table backed by `crontab -l` / `crontab -`
#[derive(Debug, Clone)]
pub struct SystemCrontab {
    binary: String,
}

impl SystemCrontab {
    pub fn new() -> Self {
        Self::with_binary("crontab")
    }

    /// Use a different `crontab` executable
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SystemCrontab {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable for SystemCrontab {
    fn read(&self) -> BackupResult<Option<String>> {
        let output = Command::new(&self.binary)
            .arg("-l")
            .stderr(Stdio::null())
            .output()
            .map_err(|e| {
                BackupError::ScheduleInstallFailed(format!("cannot run {}: {}", self.binary, e))
            })?;

        // `crontab -l` exits non-zero when the user has no table yet
        if !output.status.success() {
            debug!(status = %output.status, "crontab -l reported no table");
            return Ok(None);
        }

        String::from_utf8(output.stdout)
            .map(Some)
            .map_err(|e| BackupError::ScheduleInstallFailed(e.to_string()))
    }

    fn write(&self, contents: &str) -> BackupResult<()> {
        let fail = BackupError::ScheduleInstallFailed;

        let mut child = Command::new(&self.binary)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| fail(format!("cannot run {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading closes the pipe early;
            // its exit status below is the error worth reporting.
            let _ = stdin.write_all(contents.as_bytes());
        }

        let output = child.wait_with_output().map_err(|e| fail(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(fail(if detail.is_empty() {
                format!("{} exited with {}", self.binary, output.status)
            } else {
                format!("{} exited with {}: {}", self.binary, output.status, detail)
            }));
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_failing_binary_rejects_write() {
        let table = SystemCrontab::with_binary("false");
        let err = table.write("0 2 * * * true\n").unwrap_err();
        assert!(matches!(err, BackupError::ScheduleInstallFailed(_)));
    }

    #[test]
    fn test_failing_binary_reads_as_empty() {
        let table = SystemCrontab::with_binary("false");
        assert!(table.read().unwrap().is_none());
    }

    #[test]
    fn test_missing_binary() {
        let table = SystemCrontab::with_binary("/nonexistent/crontab");
        assert!(matches!(
            table.read().unwrap_err(),
            BackupError::ScheduleInstallFailed(_)
        ));
    }

    #[test]
    fn test_accepting_binary() {
        // `cat -` drains stdin and exits 0
        let table = SystemCrontab::with_binary("cat");
        table.write("0 2 * * * true\n").unwrap();
    }
}
