// Work routine executed inside the detached daemon

use crate::config::DaemonConfig;
use crate::error::Result;

/// What the daemon was started with, handed to the work routine
#[derive(Debug, Clone)]
pub struct RunContext {
    pid: u32,
    config: DaemonConfig,
}

impl RunContext {
    pub fn new(pid: u32, config: DaemonConfig) -> Self {
        Self { pid, config }
    }

    /// Pid of the daemon, as written to the PID file
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }
}

/// The work a concrete daemon performs once detached.
///
/// The controller owns the lifecycle; implementors only do the work. A
/// routine that runs until SIGTERM never returns, since the termination
/// handler ends the process.
pub trait Work {
    fn run(&mut self, ctx: &RunContext) -> Result<()>;
}

impl<F> Work for F
where
    F: FnMut(&RunContext) -> Result<()>,
{
    fn run(&mut self, ctx: &RunContext) -> Result<()> {
        self(ctx)
    }
}
