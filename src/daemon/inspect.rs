use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(unix)]
use crate::error::{DaemonError, Result};
#[cfg(unix)]
use std::path::PathBuf;

/// Point-in-time details about a running daemon process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDetails {
    pub pid: u32,
    pub name: String,
    /// Resident memory in bytes
    pub memory: u64,
    pub uptime: Duration,
    /// Start time in seconds since the Unix epoch
    pub started_at: u64,
}

impl ProcessDetails {
    /// Look up `pid` in the process table, `None` if it is not there
    pub fn lookup(pid: u32) -> Option<Self> {
        let sys_pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::everything(),
        );

        let process = system.process(sys_pid)?;
        Some(Self {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            memory: process.memory(),
            uptime: Duration::from_secs(process.run_time()),
            started_at: process.start_time(),
        })
    }
}

/// Process attributes a detached daemon is expected to have
#[cfg(unix)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detachment {
    pub cwd: PathBuf,
    pub umask: u32,
    pub session_leader: bool,
}

#[cfg(unix)]
impl Detachment {
    /// Read the calling process' working directory, file mode mask and
    /// session role
    pub fn current() -> Result<Self> {
        use nix::sys::stat::{umask, Mode};
        use nix::unistd::{getpid, getsid};

        // umask can only be read by setting it; put the old value straight back
        let mask = umask(Mode::empty());
        let _ = umask(mask);

        let sid =
            getsid(None).map_err(|e| DaemonError::SystemError(format!("getsid failed: {}", e)))?;

        Ok(Self {
            cwd: std::env::current_dir()?,
            umask: u32::from(mask.bits()),
            session_leader: sid == getpid(),
        })
    }
}
