// CLI module - start/stop/status front-end for the self-test daemon

mod output;

pub use output::print_error;

use crate::config::Settings;
use crate::daemon::{DaemonController, ProcessDetails, StartOutcome, StopOutcome};
use crate::error::Result;
use crate::heartbeat::Heartbeat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// daemonkit - detach a heartbeat worker and control it through a PID file
#[derive(Parser)]
#[command(name = "daemonkit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file (.toml or .json); self-test defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Start the daemon
    Start,
    /// Stop the daemon
    Stop,
    /// Check daemon status
    Status,
}

impl Cli {
    /// Run the CLI application
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute()
    }

    fn load_settings(&self) -> Result<Settings> {
        let settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        // The daemon runs from `/`, anchor relative paths here first
        let cwd = std::env::current_dir()?;
        Ok(Settings {
            daemon: settings.daemon.resolve_relative_to(&cwd),
            ..settings
        })
    }

    fn execute(&self) -> Result<()> {
        let settings = self.load_settings()?;
        let heartbeat = Heartbeat::new(&settings.heartbeat);
        let mut controller = DaemonController::with_work(settings.daemon, heartbeat);

        match self.command {
            Commands::Start => match controller.start()? {
                StartOutcome::AlreadyRunning { pid } => {
                    output::print_already_running(pid, controller.pid_file().path());
                }
                StartOutcome::Finished { pid } => {
                    tracing::info!(pid, "work routine finished");
                }
            },

            Commands::Stop => match controller.stop()? {
                StopOutcome::NotRunning => output::print_not_running(),
                StopOutcome::Stale { pid } => {
                    output::print_stale(pid, controller.pid_file().path());
                }
                StopOutcome::Signalled { pid } => output::print_signalled(pid),
            },

            Commands::Status => {
                let status = controller.status()?;
                let details = status.state.pid().and_then(|pid| {
                    if status.state.is_running() {
                        ProcessDetails::lookup(pid)
                    } else {
                        None
                    }
                });
                output::print_status(&status, details.as_ref());
            }
        }

        Ok(())
    }
}
