// Daemon lifecycle control keyed off the PID file

use super::daemonize::daemonize;
use super::inspect::ProcessDetails;
use super::pid::{is_process_alive, PidFile};
use super::work::{RunContext, Work};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Process start times are whole seconds and may lag the PID file write
const START_TIME_SLACK_SECS: u64 = 2;

/// Result of [`DaemonController::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A live daemon already owns the PID file; nothing was done
    AlreadyRunning { pid: u32 },
    /// Returned in the detached daemon once its work routine has returned
    Finished { pid: u32 },
}

/// Result of [`DaemonController::stop`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    /// The PID file names a process that no longer exists; nothing was sent
    Stale { pid: u32 },
    /// SIGTERM was delivered; the daemon removes its own PID file
    Signalled { pid: u32 },
}

/// What the PID file says about the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotRunning,
    Stale { pid: u32 },
    Running { pid: u32 },
}

impl DaemonState {
    pub fn pid(&self) -> Option<u32> {
        match self {
            DaemonState::NotRunning => None,
            DaemonState::Stale { pid } | DaemonState::Running { pid } => Some(*pid),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, DaemonState::Running { .. })
    }
}

/// Daemon status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub state: DaemonState,
    pub pid_file: PathBuf,
}

/// Turns the calling process into a background daemon running the supplied
/// work, and offers start/stop/status against the configured PID file.
pub struct DaemonController {
    config: DaemonConfig,
    pid_file: PidFile,
    work: Option<Box<dyn Work>>,
}

impl DaemonController {
    /// Create a controller without a work routine; [`run`](Self::run)
    /// reports [`DaemonError::NotImplemented`]
    pub fn new(config: DaemonConfig) -> Self {
        let pid_file = PidFile::with_path(&config.pid_file);
        Self {
            config,
            pid_file,
            work: None,
        }
    }

    pub fn with_work<W: Work + 'static>(config: DaemonConfig, work: W) -> Self {
        let mut controller = Self::new(config);
        controller.work = Some(Box::new(work));
        controller
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Read the PID file and check that the recorded process still exists
    fn recorded_state(&self) -> Result<DaemonState> {
        Ok(match self.pid_file.read()? {
            None => DaemonState::NotRunning,
            Some(pid) if is_process_alive(pid) && !self.pid_was_reused(pid) => {
                DaemonState::Running { pid }
            }
            Some(pid) => DaemonState::Stale { pid },
        })
    }

    /// A process that started after the PID file was written is not the
    /// daemon that wrote it. Unknown times are trusted.
    fn pid_was_reused(&self, pid: u32) -> bool {
        let written = match self.pid_file.modified() {
            Some(time) => time,
            None => return false,
        };
        let written_secs = match written.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs(),
            Err(_) => return false,
        };

        match ProcessDetails::lookup(pid) {
            Some(details) if details.started_at > written_secs + START_TIME_SLACK_SECS => {
                tracing::warn!(
                    pid,
                    file = %self.pid_file.path().display(),
                    "recorded pid now belongs to a newer process"
                );
                true
            }
            _ => false,
        }
    }

    /// Start the daemon.
    ///
    /// With no live daemon recorded, this detaches the process and runs the
    /// work routine in the daemon; the invoking process exits with status 0
    /// inside this call.
    pub fn start(&mut self) -> Result<StartOutcome> {
        match self.recorded_state()? {
            DaemonState::Running { pid } => {
                return Ok(StartOutcome::AlreadyRunning { pid });
            }
            DaemonState::Stale { pid } => {
                tracing::warn!(
                    pid,
                    file = %self.pid_file.path().display(),
                    "removing stale PID file"
                );
                self.pid_file.remove()?;
            }
            DaemonState::NotRunning => {}
        }

        eprintln!("Daemon starting...");
        let pid = daemonize(&self.config)?;

        let ctx = RunContext::new(pid, self.config.clone());
        self.run(&ctx)?;

        Ok(StartOutcome::Finished { pid })
    }

    /// Stop the daemon by sending SIGTERM. Does not wait for it to exit.
    #[cfg(unix)]
    pub fn stop(&self) -> Result<StopOutcome> {
        let pid = match self.recorded_state()? {
            DaemonState::NotRunning => return Ok(StopOutcome::NotRunning),
            DaemonState::Stale { pid } => return Ok(StopOutcome::Stale { pid }),
            DaemonState::Running { pid } => pid,
        };

        eprintln!("Stopping daemon...");
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| DaemonError::SignalError(format!("Failed to send SIGTERM: {}", e)))?;
        tracing::info!(pid, "SIGTERM sent");

        Ok(StopOutcome::Signalled { pid })
    }

    #[cfg(not(unix))]
    pub fn stop(&self) -> Result<StopOutcome> {
        Err(DaemonError::Unsupported)
    }

    /// Get daemon status information; never touches the PID file
    pub fn status(&self) -> Result<DaemonStatus> {
        Ok(DaemonStatus {
            state: self.recorded_state()?,
            pid_file: self.pid_file.path().to_path_buf(),
        })
    }

    /// Run the supplied work routine
    pub fn run(&mut self, ctx: &RunContext) -> Result<()> {
        match self.work.as_mut() {
            Some(work) => work.run(ctx),
            None => Err(DaemonError::NotImplemented),
        }
    }
}
