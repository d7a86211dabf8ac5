// Shared sandbox for tests that drive the daemonkit binary

#![allow(dead_code)]

use daemonkit::config::{DaemonConfig, HeartbeatConfig, Settings};
use daemonkit::daemon::PidFile;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// A temporary directory holding the settings file, PID file and log of
/// one daemon
pub struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_heartbeat(HeartbeatConfig {
            interval_secs: 1,
            beats: None,
        })
    }

    pub fn with_heartbeat(heartbeat: HeartbeatConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("daemon.toml");
        let log = dir.path().join("daemon.log");
        let settings = Settings {
            daemon: DaemonConfig::new(dir.path().join("daemon.pid"))
                .with_stdout(&log)
                .with_stderr(&log),
            heartbeat,
        };
        fs::write(&config, toml::to_string(&settings).unwrap()).unwrap();
        Self { dir, config }
    }

    pub fn pid_path(&self) -> PathBuf {
        self.dir.path().join("daemon.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("daemon.log")
    }

    pub fn run(&self, command: &str) -> Output {
        Command::new(env!("CARGO_BIN_EXE_daemonkit"))
            .arg("--config")
            .arg(&self.config)
            .arg(command)
            .env("NO_COLOR", "1")
            .env("RUST_LOG", "info")
            .output()
            .unwrap()
    }

    /// Wait for the daemon to publish its pid
    pub fn wait_for_pid(&self) -> u32 {
        let pid_file = PidFile::with_path(self.pid_path());
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(pid)) = pid_file.read() {
                return pid;
            }
            sleep(Duration::from_millis(50));
        }
        panic!("daemon never wrote {}", self.pid_path().display());
    }

    /// Wait for the daemon's start line in the log and return its pid
    pub fn wait_for_started_pid(&self) -> u32 {
        let log = self.log_path();
        let mut pid = None;
        let found = wait_until(|| {
            pid = fs::read_to_string(&log).ok().and_then(|content| {
                content.lines().find_map(|line| {
                    line.strip_prefix("Daemon started with pid ")
                        .and_then(|rest| rest.trim().parse().ok())
                })
            });
            pid.is_some()
        });
        assert!(found, "daemon never announced itself in {}", log.display());
        pid.unwrap()
    }
}

impl Drop for Sandbox {
    // Never leave a daemon behind when an assertion fails
    fn drop(&mut self) {
        if let Ok(content) = fs::read_to_string(self.pid_path()) {
            if let Ok(pid) = content.trim().parse::<i32>() {
                if pid > 0 {
                    let _ = nix::sys::signal::kill(
                        nix::unistd::Pid::from_raw(pid),
                        nix::sys::signal::Signal::SIGKILL,
                    );
                }
            }
        }
    }
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(50));
    }
    false
}

pub fn log_contains(path: &Path, needle: &str) -> bool {
    fs::read_to_string(path)
        .map(|log| log.contains(needle))
        .unwrap_or(false)
}
