// src/lib.rs

pub mod agents;
pub mod cli;
pub mod config;
pub mod errors;
pub mod launch;
pub mod lifecycle;
pub mod logging;
pub mod qc;
pub mod readiness;
pub mod remote;
pub mod store;
pub mod workflow;

use anyhow::Result;
use tracing::info;

use crate::agents::{AgentContext, DetachedLauncher};
use crate::cli::{AgentArgs, CliArgs, Command};
use crate::remote::VendorCli;
use crate::store::Store;

/// High-level entry point used by `main.rs`.
///
/// Wires together config loading, the entity store, the remote service
/// adapter, and the requested agent pass.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = config::load_and_validate(&args.config)?;
    let store = Store::open(&cfg.store.path)?;
    let remote = VendorCli::from_config(&cfg);

    match args.command {
        Command::Init => {
            store.init_schema()?;
            info!(path = %cfg.store.path, "entity store initialised");
        }
        Command::Submit {
            agent,
            ignore_yield,
        } => {
            let ctx = context(&store, &remote, &cfg, &agent);
            agents::submit::submit_pass(&ctx, ignore_yield).await?;
        }
        Command::Track { agent } => {
            let ctx = context(&store, &remote, &cfg, &agent);
            agents::track::track_pass(&ctx).await?;
        }
        Command::Qc { agent } => {
            let ctx = context(&store, &remote, &cfg, &agent);
            agents::qc_check::qc_pass(&ctx).await?;
        }
        Command::Download { agent } => {
            let ctx = context(&store, &remote, &cfg, &agent);
            let mut launcher = DetachedLauncher;
            agents::download::download_pass(&ctx, &mut launcher).await?;
        }
        Command::Simulate { id } => {
            let ctx = AgentContext {
                store: &store,
                remote: &remote,
                config: &cfg,
                safe: true,
                only_job: Some(id),
            };
            let job = store.job_by_id(id)?;
            let payload = agents::submit::build_payload(&ctx, &job).await?;
            println!("{}", payload.to_json()?);
        }
        Command::DownloadWorker { id } => {
            let ctx = AgentContext {
                store: &store,
                remote: &remote,
                config: &cfg,
                safe: false,
                only_job: Some(id),
            };
            agents::worker::download_one(&ctx, id).await?;
        }
    }

    Ok(())
}

fn context<'a>(
    store: &'a Store,
    remote: &'a VendorCli,
    cfg: &'a config::ConfigFile,
    agent: &AgentArgs,
) -> AgentContext<'a> {
    AgentContext {
        store,
        remote,
        config: cfg,
        safe: agent.safe,
        only_job: agent.id,
    }
}
