//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Manage hyperkit VMs and the host bridges they attach to.
#[derive(Debug, Parser)]
#[command(name = "tapvisor", version, about)]
pub struct Cli {
    /// Topology file or directory; repeat to merge several
    #[arg(short, long, global = true)]
    pub config: Vec<PathBuf>,

    /// Hypervisor executable [env: TAPVISOR_HYPERVISOR]
    #[arg(long, global = true)]
    pub hypervisor: Option<PathBuf>,

    /// Bridge utility executable [env: TAPVISOR_IFCONFIG]
    #[arg(long, global = true)]
    pub ifconfig: Option<PathBuf>,

    /// Print what would be done without launching or reconfiguring anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start VMs and converge their tap networks
    Up {
        /// Only this VM
        name: Option<String>,
    },
    /// Signal running VMs
    Down {
        /// Only this VM
        name: Option<String>,
        /// Signal name or number
        #[arg(short, long, default_value = "SIGTERM")]
        signal: String,
    },
    /// Show VM liveness
    Status {
        /// Only this VM
        name: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check VM declarations against the host
    Validate {
        /// Only this VM
        name: Option<String>,
    },
    /// Manage host bridges
    #[command(subcommand)]
    Net(NetCommand),
}

#[derive(Debug, Subcommand)]
pub enum NetCommand {
    /// Converge every tap network from the running VMs
    Up {
        /// Also remove members no running VM declares
        #[arg(long)]
        prune: bool,
    },
    /// Destroy the bridge of a tap network
    Destroy {
        /// Network name
        name: String,
    },
}
