// Diagnostic output for the CLI. Everything goes to stderr; stdout belongs
// to the daemon's work once detached.

use crate::daemon::{DaemonState, DaemonStatus, ProcessDetails};
use colored::*;
use std::path::Path;
use std::time::Duration;

pub fn print_already_running(pid: u32, pid_file: &Path) {
    eprintln!(
        "{} Daemon already running...PID: {}, PID file: {}",
        "ℹ".blue().bold(),
        pid,
        pid_file.display()
    );
}

pub fn print_not_running() {
    eprintln!("{} Daemon not running.", "✗".red().bold());
}

pub fn print_stale(pid: u32, pid_file: &Path) {
    eprintln!(
        "{} Daemon not running (stale PID file {} names exited PID {})",
        "⚠".yellow().bold(),
        pid_file.display(),
        pid
    );
}

pub fn print_signalled(pid: u32) {
    eprintln!("{} SIGTERM sent to PID {}", "✓".green().bold(), pid);
}

/// Print a status report, with process details when they could be read
pub fn print_status(status: &DaemonStatus, details: Option<&ProcessDetails>) {
    match status.state {
        DaemonState::NotRunning => print_not_running(),
        DaemonState::Stale { pid } => print_stale(pid, &status.pid_file),
        DaemonState::Running { pid } => {
            eprintln!(
                "{} Daemon running...PID: {}, PID file: {}",
                "✓".green().bold(),
                pid,
                status.pid_file.display()
            );
            if let Some(details) = details {
                eprintln!("  {}: {}", "Name".bold(), details.name.cyan());
                eprintln!("  {}: {}", "Memory".bold(), format_memory(details.memory));
                eprintln!("  {}: {}", "Uptime".bold(), format_duration(&details.uptime));
            }
        }
    }
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Format memory size in human-readable format
fn format_memory(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}
