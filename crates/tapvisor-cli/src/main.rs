//! tapvisor entry point.
//!
//! Loads the topology, wires the hypervisor controller and the bridge
//! reconciler together and runs one subcommand. Logs go to stderr, results
//! to stdout.

mod cli;
mod config;
mod output;

use clap::Parser;
use cli::{Cli, Command, NetCommand};
use config::CliConfig;
use std::process::ExitCode;
use std::sync::Arc;
use tapvisor_core::{Orchestrator, Topology};
use tapvisor_net::{ConvergeMode, Ifconfig, Reconciler};
use tapvisor_vm::VmController;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("tapvisor=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = CliConfig::from_env().with_overrides(&cli);
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");

    let topology = Topology::load_paths(config.config_paths.as_slice())?;
    tracing::debug!(
        base_dir = %topology.base_dir.display(),
        vms = topology.vms.len(),
        networks = topology.networks.len(),
        "topology loaded"
    );

    let reconciler = Reconciler::new(Arc::new(Ifconfig::new(&config.ifconfig)))
        .with_wait_policy(config.wait_policy());
    let orchestrator = Orchestrator::new(VmController::new(&config.hypervisor), reconciler);

    let ok = run(&orchestrator, &topology, cli.command, cli.dry_run).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run one subcommand. `Ok(false)` when any item failed.
async fn run(
    orchestrator: &Orchestrator,
    topology: &Topology,
    command: Command,
    dry_run: bool,
) -> anyhow::Result<bool> {
    match command {
        Command::Up { name } => {
            let report = orchestrator.up(topology, name.as_deref(), dry_run).await?;
            print!("{}", output::render_outcomes("vm", &report.vms));
            print!("{}", output::render_outcomes("network", &report.networks));
            Ok(!report.has_failures())
        }
        Command::Down { name, signal } => {
            let outcomes = orchestrator.down(topology, name.as_deref(), Some(signal.as_str()))?;
            print!("{}", output::render_outcomes("vm", &outcomes));
            Ok(outcomes.iter().all(|o| !o.is_err()))
        }
        Command::Status { name, json } => {
            let statuses = orchestrator.status(topology, name.as_deref())?;
            if json {
                println!("{}", output::status_json(&statuses)?);
            } else {
                print!("{}", output::render_status(&statuses));
            }
            Ok(true)
        }
        Command::Validate { name } => {
            let outcomes = orchestrator.validate(topology, name.as_deref())?;
            print!("{}", output::render_outcomes("vm", &outcomes));
            Ok(outcomes.iter().all(|o| !o.is_err()))
        }
        Command::Net(NetCommand::Up { prune }) => {
            let mode = if prune {
                ConvergeMode::Prune
            } else {
                ConvergeMode::Additive
            };
            let outcomes = orchestrator.reconcile(topology, mode, dry_run).await?;
            print!("{}", output::render_outcomes("network", &outcomes));
            Ok(outcomes.iter().all(|o| !o.is_err()))
        }
        Command::Net(NetCommand::Destroy { name }) => {
            if dry_run {
                println!("network {name}: would destroy");
                return Ok(true);
            }
            orchestrator.destroy_network(topology, &name).await?;
            println!("network {name}: destroyed");
            Ok(true)
        }
    }
}
