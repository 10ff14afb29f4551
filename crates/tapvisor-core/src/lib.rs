//! # tapvisor-core
//!
//! Loads a declared topology of VMs and tap networks and applies it to
//! the host.
//!
//! ## Architecture
//!
//! ```text
//!  tapvisor.toml / tapvisor.d/*.toml
//!                │
//!                ▼
//!        ┌───────────────┐
//!        │   Topology    │  paths resolved, defaults applied
//!        └───────┬───────┘
//!                ▼
//!        ┌───────────────┐      ┌────────────────────────────┐
//!        │ Orchestrator  │─────▶│ VmController (tapvisor-vm) │──▶ hypervisor
//!        │  - up()       │      └────────────────────────────┘
//!        │  - down()     │      ┌────────────────────────────┐
//!        │  - reconcile()│─────▶│ Reconciler (tapvisor-net)  │──▶ ifconfig
//!        └───────────────┘      └────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tapvisor_core::{Orchestrator, Topology};
//! use tapvisor_net::{Ifconfig, Reconciler};
//! use tapvisor_vm::VmController;
//!
//! # async fn example() -> tapvisor_core::Result<()> {
//! let topology = Topology::load_paths(&["tapvisor.toml", "tapvisor.d"])?;
//! let orchestrator = Orchestrator::new(
//!     VmController::new("hyperkit"),
//!     Reconciler::new(Arc::new(Ifconfig::default())),
//! );
//!
//! let report = orchestrator.up(&topology, None, false).await?;
//! for vm in &report.vms {
//!     println!("{}: {:?}", vm.name, vm.result);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod orchestrator;

pub use config::{Topology, STATE_DIR};
pub use error::{CoreError, Result};
pub use orchestrator::{
    NetworkAction, NetworkOutcome, Orchestrator, Outcome, UpReport, VmAction, VmOutcome,
};
