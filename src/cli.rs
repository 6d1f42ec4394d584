// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Each polling agent is a subcommand so that a scheduler (cron or similar)
//! can invoke them independently: `flowdag submit`, `flowdag track`, etc.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `flowdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flowdag",
    version,
    about = "Poll analysis jobs through submission, tracking, QC and download.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Flowdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Flowdag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOWDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every agent pass.
#[derive(Debug, Clone, Args)]
pub struct AgentArgs {
    /// Safe mode: report what would be done without writing statuses,
    /// calling the remote service mutably, or launching processes.
    #[arg(short, long)]
    pub safe: bool,

    /// Restrict the pass to one explicit job id.
    #[arg(short, long, value_name = "JOB_ID")]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the entity store schema.
    Init,

    /// Submit jobs in `waiting` whose dependencies are satisfied.
    Submit {
        #[command(flatten)]
        agent: AgentArgs,

        /// Treat samples with data but insufficient yield as ready
        /// (a warning is still attached to the readiness detail).
        #[arg(short = 'Y', long)]
        ignore_yield: bool,
    },

    /// Poll remote status for jobs in `submitted`, `pending` or `running`.
    Track {
        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Apply automated QC to jobs in `app-finished`.
    Qc {
        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Launch deliverable downloads for jobs in `qc-passed`, bounded by the
    /// configured concurrency cap.
    Download {
        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Print the launch payload that `submit` would send for one job.
    Simulate {
        #[arg(short, long, value_name = "JOB_ID")]
        id: i64,
    },

    /// Download one job's deliverables and record the terminal status.
    ///
    /// In normal operation this is spawned by `download`, one process per
    /// job, but it can also be run manually.
    DownloadWorker {
        #[arg(short, long, value_name = "JOB_ID")]
        id: i64,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
