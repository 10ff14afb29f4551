//! # tapvisor-vm
//!
//! VM declarations and the hypervisor process lifecycle.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tapvisor_vm::{apply_identity, NetConf, VmBuilder, VmController};
//!
//! # fn example() -> tapvisor_vm::Result<()> {
//! let mut spec = VmBuilder::new("web")
//!     .cores(2)
//!     .memory("1G")
//!     .run_dir("/var/run/tapvisor/web")
//!     .with_network(NetConf::tap("tap0", "lan"))
//!     .kexec("/vm/web/vmlinuz", "/vm/web/initrd", "console=ttyS0")
//!     .build_spec();
//!
//! // Persisted UUID and MAC, stable across restarts
//! apply_identity(&mut spec)?;
//!
//! let controller = VmController::new("hyperkit");
//! controller.validate(&spec)?;
//! let outcome = controller.up(&spec)?;
//! println!("{} started as pid {}", spec.name, outcome.pid());
//!
//! controller.down(&spec, Some("SIGTERM"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Argument Builder**: deterministic hypervisor command line
//! - **Process Lifecycle**: PID-file based status, detached launch, signals
//! - **Identity**: persisted UUID and per-network MAC addresses
//! - **Validation**: pre-flight checks for boot files and network devices

mod args;
mod builder;
mod config;
mod controller;
mod error;
mod identity;
mod process;
mod validate;

pub use args::build_args;
pub use builder::VmBuilder;
pub use config::{Boot, Cdrom, Firmware, FreeBsd, Hdd, Kexec, NetConf, VmSpec, PID_FILE, UUID_FILE};
pub use controller::{UpOutcome, VmController, VmStatus};
pub use error::{Result, VmError};
pub use identity::{apply_identity, load_or_create_mac, load_or_create_uuid, MacAddr};
pub use process::{parse_signal, read_pid, ProcessEntry, ProcessTable, SysinfoTable};
pub use validate::validate;

pub use nix::sys::signal::Signal;
