// Daemonization support for Unix systems

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};

#[cfg(unix)]
use super::cleanup;
#[cfg(unix)]
use super::inspect::Detachment;
#[cfg(unix)]
use super::pid::PidFile;
#[cfg(unix)]
use std::fs::{File, OpenOptions};
#[cfg(unix)]
use std::io::Write;

/// Detach the calling process and turn it into the daemon.
///
/// Returns the daemon's pid in the detached grandchild. The original
/// process and the intermediate session leader exit with status 0 and
/// never return from this call. Once this returns, the PID file has been
/// written and is removed on exit or on SIGTERM.
#[cfg(unix)]
pub fn daemonize(config: &DaemonConfig) -> Result<u32> {
    use nix::sys::stat::{umask, Mode};
    use nix::unistd::{chdir, fork, getpid, setsid, ForkResult};

    // Nothing buffered may be inherited and written twice
    flush_standard_streams();

    // First fork
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!(child = child.as_raw(), "first fork done, parent exiting");
            std::process::exit(0);
        }
        Ok(ForkResult::Child) => {}
        Err(e) => {
            return Err(DaemonError::ForkFailed {
                stage: 1,
                reason: e.to_string(),
            });
        }
    }

    // Do not keep any mount point busy
    chdir("/")
        .map_err(|e| DaemonError::SystemError(format!("Failed to change directory to /: {}", e)))?;
    let _ = umask(Mode::empty());

    // Create new session and become session leader
    setsid().map_err(|e| DaemonError::SystemError(format!("setsid failed: {}", e)))?;

    // Second fork: a non-leader can never reacquire a controlling terminal
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => {
            std::process::exit(0);
        }
        Ok(ForkResult::Child) => {}
        Err(e) => {
            return Err(DaemonError::ForkFailed {
                stage: 2,
                reason: e.to_string(),
            });
        }
    }

    flush_standard_streams();
    redirect_standard_streams(config)?;

    let pid = getpid().as_raw() as u32;
    publish_pid(&PidFile::with_path(&config.pid_file), pid)?;

    match Detachment::current() {
        Ok(detached) => tracing::info!(
            pid,
            cwd = %detached.cwd.display(),
            umask = %format!("{:04o}", detached.umask),
            session_leader = detached.session_leader,
            "daemon detached"
        ),
        Err(e) => tracing::info!(pid, error = %e, "daemon detached"),
    }
    Ok(pid)
}

/// Write the PID file, then arrange for its removal on exit and on SIGTERM.
/// If the arrangement fails the file is taken back down, since the process
/// it names is about to exit.
#[cfg(unix)]
fn publish_pid(pid_file: &PidFile, pid: u32) -> Result<()> {
    pid_file.write(pid)?;

    let armed = cleanup::register_pid_file_cleanup(pid_file.path())
        .and_then(|()| cleanup::install_termination_handler());
    if let Err(e) = armed {
        if let Err(remove_err) = pid_file.remove() {
            tracing::warn!(error = %remove_err, "failed to withdraw PID file");
        }
        return Err(e);
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn daemonize(_config: &DaemonConfig) -> Result<u32> {
    Err(DaemonError::Unsupported)
}

#[cfg(unix)]
fn flush_standard_streams() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}

/// Opened redirection targets for fds 0, 1 and 2
#[cfg(unix)]
struct StreamTargets {
    stdin: File,
    stdout: File,
    stderr: File,
}

#[cfg(unix)]
impl StreamTargets {
    /// Open all three targets before touching any descriptor, so a failure
    /// still reaches the original stderr
    fn open(config: &DaemonConfig) -> Result<Self> {
        let stdin = File::open(&config.stdin).map_err(|e| {
            DaemonError::RedirectError(format!(
                "Failed to open stdin source {}: {}",
                config.stdin.display(),
                e
            ))
        })?;

        let open_sink = |path: &std::path::Path, name: &str| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    DaemonError::RedirectError(format!(
                        "Failed to open {} sink {}: {}",
                        name,
                        path.display(),
                        e
                    ))
                })
        };

        Ok(Self {
            stdin,
            stdout: open_sink(&config.stdout, "stdout")?,
            stderr: open_sink(&config.stderr, "stderr")?,
        })
    }
}

#[cfg(unix)]
fn redirect_standard_streams(config: &DaemonConfig) -> Result<()> {
    use nix::libc;

    let targets = StreamTargets::open(config)?;
    dup_onto(targets.stdin, libc::STDIN_FILENO)?;
    dup_onto(targets.stdout, libc::STDOUT_FILENO)?;
    dup_onto(targets.stderr, libc::STDERR_FILENO)?;
    Ok(())
}

/// Duplicate `file` onto `target`, then close the original handle
#[cfg(unix)]
fn dup_onto(file: File, target: std::os::unix::io::RawFd) -> Result<()> {
    use std::os::unix::io::{AsRawFd, IntoRawFd};

    let fd = file.as_raw_fd();
    if fd == target {
        // Opened straight into the slot (the standard fd was closed); keep it
        let _ = file.into_raw_fd();
        return Ok(());
    }

    nix::unistd::dup2(fd, target).map_err(|e| {
        DaemonError::RedirectError(format!("dup2 onto fd {} failed: {}", target, e))
    })?;
    Ok(())
}
