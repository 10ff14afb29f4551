//! # tapvisor-net
//!
//! Host bridge management for tapvisor networks.
//!
//! Reads the current state of a bridge through the bridge utility, diffs it
//! against the declared state and applies idempotent operations until the
//! two agree.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tapvisor_net::{Bridge, ConvergeMode, Ifconfig, Reconciler};
//!
//! # async fn example() -> tapvisor_net::Result<()> {
//! let reconciler = Reconciler::new(Arc::new(Ifconfig::default()));
//!
//! let desired = Bridge::new("bridge1")
//!     .with_address("10.0.0.1".parse().unwrap(), "255.255.255.0".parse().unwrap())
//!     .with_member("tap0");
//!
//! let report = reconciler.converge(&desired, ConvergeMode::Additive).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod bridge;
mod control;
mod error;
mod parse;
mod reconcile;
mod spec;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bridge::{default_mask, mask_from_prefix, member_diff, Bridge};
pub use control::{BridgeControl, Ifconfig};
pub use error::{NetError, Result};
pub use parse::parse_ifconfig;
pub use reconcile::{
    ConvergeMode, ConvergeReport, Reconciler, WaitPolicy, DEFAULT_WAIT_ATTEMPTS, DEFAULT_WAIT_INTERVAL,
};
pub use spec::{NetworkSpec, Tap, Vmnet, VpnKit};
