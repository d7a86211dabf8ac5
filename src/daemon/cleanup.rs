// Process-wide PID file release on exit and on SIGTERM

use crate::error::{DaemonError, Result};
use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::OnceLock;

/// Exit status used when the daemon is terminated by SIGTERM
pub const TERMINATED_EXIT_CODE: i32 = 1;

/// PID file owned by this process, kept as a C string so the signal handler
/// can unlink it without allocating
static OWNED_PID_FILE: OnceLock<CString> = OnceLock::new();

/// Arrange for `path` to be removed when the process exits normally.
///
/// Only one PID file can be registered per process.
pub fn register_pid_file_cleanup(path: &Path) -> Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        DaemonError::PidFileError(format!(
            "PID file path contains a NUL byte: {}",
            path.display()
        ))
    })?;

    OWNED_PID_FILE.set(c_path).map_err(|_| {
        DaemonError::SystemError("A PID file cleanup is already registered".to_string())
    })?;

    // SAFETY: the hook only reads the static initialised above
    if unsafe { libc::atexit(remove_at_exit) } != 0 {
        return Err(DaemonError::SystemError(
            "Failed to register exit-time PID file cleanup".to_string(),
        ));
    }

    tracing::debug!(file = %path.display(), "pid file cleanup registered");
    Ok(())
}

/// Install a SIGTERM handler that removes the registered PID file and exits
/// with [`TERMINATED_EXIT_CODE`].
pub fn install_termination_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_termination),
        SaFlags::empty(),
        SigSet::empty(),
    );

    // SAFETY: the handler only calls async-signal-safe functions
    unsafe { sigaction(Signal::SIGTERM, &action) }.map_err(|e| {
        DaemonError::SignalError(format!("Failed to install SIGTERM handler: {}", e))
    })?;

    tracing::info!("SIGTERM handler installed");
    Ok(())
}

#[cfg(test)]
fn registered_pid_file() -> Option<&'static Path> {
    OWNED_PID_FILE
        .get()
        .map(|path| Path::new(std::ffi::OsStr::from_bytes(path.as_bytes())))
}

fn remove_owned_pid_file() {
    if let Some(path) = OWNED_PID_FILE.get() {
        // SAFETY: NUL-terminated path; unlink is async-signal-safe
        unsafe {
            libc::unlink(path.as_ptr());
        }
    }
}

extern "C" fn remove_at_exit() {
    remove_owned_pid_file();
}

extern "C" fn on_termination(_signal: libc::c_int) {
    remove_owned_pid_file();
    // _exit skips atexit hooks, which is fine: the file is already gone
    unsafe { libc::_exit(TERMINATED_EXIT_CODE) }
}
