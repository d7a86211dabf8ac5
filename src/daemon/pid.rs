// PID file management for the daemon process

use crate::error::{DaemonError, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The on-disk record of the running daemon's process id
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write `pid` as a decimal line, creating or truncating the file
    pub fn write(&self, pid: u32) -> Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }

        let mut file = options
            .open(&self.path)
            .map_err(|e| DaemonError::PidFileError(format!("Failed to write PID file: {}", e)))?;
        writeln!(file, "{}", pid)
            .map_err(|e| DaemonError::PidFileError(format!("Failed to write PID file: {}", e)))?;

        tracing::info!(pid, file = %self.path.display(), "pid file written");
        Ok(())
    }

    /// Read the PID from the file.
    ///
    /// A missing file is `Ok(None)`. Anything that is not a positive pid
    /// is reported as [`DaemonError::MalformedPidFile`].
    pub fn read(&self) -> Result<Option<u32>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DaemonError::PidFileError(format!(
                    "Failed to read PID file: {}",
                    e
                )))
            }
        };

        match parse_pid(&content) {
            Some(pid) => Ok(Some(pid)),
            None => Err(DaemonError::MalformedPidFile {
                path: self.path.clone(),
                content: content.trim().to_string(),
            }),
        }
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the PID file; a file that is already gone is not an error
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DaemonError::PidFileError(format!(
                "Failed to remove PID file: {}",
                e
            ))),
        }
    }

    /// Last modification time, `None` if the file is missing or unreadable
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|meta| meta.modified()).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse trimmed PID file content. Zero and anything above `i32::MAX`
/// are rejected since `kill` gives those special meanings.
fn parse_pid(content: &str) -> Option<u32> {
    content
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid > 0 && *pid <= i32::MAX as u32)
}

/// Check if a process with the given PID is alive
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // A zero signal only performs the existence and permission checks
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(nix::errno::Errno::EPERM) => true, // exists, owned by someone else
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    // No cheap liveness check here; trust the PID file
    true
}
