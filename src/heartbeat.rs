// Self-test work routine: periodic liveness lines on stdout

use crate::config::HeartbeatConfig;
use crate::daemon::{RunContext, Work};
use crate::error::{DaemonError, Result};
use chrono::Local;
use std::io::{self, Write};
use std::time::Duration;

/// Writes a startup line, then `Daemon Alive! <time>` every interval
pub struct Heartbeat<W = io::Stdout> {
    out: W,
    interval: Duration,
    limit: Option<usize>,
}

impl Heartbeat {
    pub fn new(config: &HeartbeatConfig) -> Self {
        let heartbeat = Self::with_writer(io::stdout(), config.interval());
        match config.beats {
            Some(beats) => heartbeat.with_limit(beats),
            None => heartbeat,
        }
    }
}

impl<W: Write> Heartbeat<W> {
    pub fn with_writer(out: W, interval: Duration) -> Self {
        Self {
            out,
            interval,
            limit: None,
        }
    }

    /// Stop after `beats` lines instead of looping until terminated
    pub fn with_limit(mut self, beats: usize) -> Self {
        self.limit = Some(beats);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn beat(&mut self) -> io::Result<()> {
        // ctime(3) layout
        writeln!(
            self.out,
            "Daemon Alive! {}",
            Local::now().format("%a %b %e %H:%M:%S %Y")
        )?;
        self.out.flush()
    }
}

impl<W: Write> Work for Heartbeat<W> {
    fn run(&mut self, ctx: &RunContext) -> Result<()> {
        let io_err = |e: io::Error| DaemonError::WorkError(format!("heartbeat write failed: {}", e));

        writeln!(self.out, "Daemon started with pid {}", ctx.pid()).map_err(io_err)?;
        self.out.flush().map_err(io_err)?;

        let mut beats = 0;
        while self.limit.map_or(true, |limit| beats < limit) {
            self.beat().map_err(io_err)?;
            beats += 1;
            std::thread::sleep(self.interval);
        }

        Ok(())
    }
}
