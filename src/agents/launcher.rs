// src/agents/launcher.rs

//! Pluggable process launching for the download dispatcher.
//!
//! The dispatcher talks to a [`ProcessLauncher`] instead of spawning
//! directly, so tests can count launches and inject failures without
//! touching the OS. Production uses [`DetachedLauncher`].

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{FlowdagError, Result};
use crate::remote::BoxFuture;

/// Trait abstracting how download worker processes are started.
pub trait ProcessLauncher: Send {
    /// Start `command` as an independent process and return its pid.
    ///
    /// The caller never waits on the process; the worker owns its own
    /// lifecycle and writes its own terminal status.
    fn launch<'a>(&'a mut self, command: &'a [String]) -> BoxFuture<'a, u32>;
}

/// Real launcher used in production: spawns the worker detached, with all
/// standard streams closed (the worker logs through its own subscriber).
#[derive(Debug, Default)]
pub struct DetachedLauncher;

impl ProcessLauncher for DetachedLauncher {
    fn launch<'a>(&'a mut self, command: &'a [String]) -> BoxFuture<'a, u32> {
        Box::pin(async move {
            let program = command.first().ok_or_else(|| {
                FlowdagError::ConfigError("empty download worker command".to_string())
            })?;
            let child = Command::new(program)
                .args(&command[1..])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| FlowdagError::Remote(format!("spawning {program}: {e}")))?;
            let pid = child.id().unwrap_or(0);
            debug!(pid, command = %command.join(" "), "launched download worker");
            // deliberately not awaited; the child outlives this pass
            Ok(pid)
        })
    }
}
