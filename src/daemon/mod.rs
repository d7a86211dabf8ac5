// Daemon module - Background process lifecycle

#[cfg(unix)]
pub mod cleanup;
pub mod controller;
pub mod daemonize;
pub mod inspect;
pub mod pid;
pub mod work;

pub use controller::{DaemonController, DaemonState, DaemonStatus, StartOutcome, StopOutcome};
pub use daemonize::daemonize;
#[cfg(unix)]
pub use inspect::Detachment;
pub use inspect::ProcessDetails;
pub use pid::PidFile;
pub use work::{RunContext, Work};
