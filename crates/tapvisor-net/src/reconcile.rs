//! Bridge convergence.
//!
//! ```text
//! converge(desired)
//!     ├─► query           absent? ─► create
//!     ├─► set address     only when created or address differs
//!     ├─► wait members    bounded poll for tap devices the hypervisor
//!     │                   creates after launch
//!     ├─► add members     one batched call
//!     ├─► remove members  ConvergeMode::Prune only
//!     └─► up
//! ```

use crate::bridge::{default_mask, member_diff, Bridge};
use crate::control::BridgeControl;
use crate::error::{NetError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Default number of existence probes per missing member.
pub const DEFAULT_WAIT_ATTEMPTS: u32 = 10;

/// Default spacing between existence probes.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(1);

/// Whether convergence may remove members that are not desired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvergeMode {
    /// Only add. Safe while sibling VMs are still starting.
    #[default]
    Additive,
    /// Add and remove, making membership exactly the desired set.
    Prune,
}

/// Budget for waiting on a member interface to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Probes before giving up (at least one probe always runs)
    pub attempts: u32,
    /// Sleep between probes
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_WAIT_ATTEMPTS,
            interval: DEFAULT_WAIT_INTERVAL,
        }
    }
}

impl WaitPolicy {
    /// Longest time a single member can be waited on.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts.saturating_sub(1)
    }
}

/// What a convergence pass did, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergeReport {
    pub device: String,
    pub created: bool,
    pub address_set: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Members present but not desired, left alone in additive mode
    pub stale: Vec<String>,
    pub brought_up: bool,
}

impl ConvergeReport {
    fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            ..Default::default()
        }
    }

    /// True when nothing but the idempotent `up` was issued.
    pub fn is_noop(&self) -> bool {
        !self.created && !self.address_set && self.added.is_empty() && self.removed.is_empty()
    }
}

impl fmt::Display for ConvergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.created {
            writeln!(f, "{}: created", self.device)?;
        }
        if self.address_set {
            writeln!(f, "{}: address set", self.device)?;
        }
        for member in &self.added {
            writeln!(f, "{}: added member {member}", self.device)?;
        }
        for member in &self.removed {
            writeln!(f, "{}: removed member {member}", self.device)?;
        }
        for member in &self.stale {
            writeln!(f, "{}: kept undeclared member {member}", self.device)?;
        }
        if self.brought_up {
            write!(f, "{}: up", self.device)?;
        }
        Ok(())
    }
}

/// Drives a [`BridgeControl`] towards a desired [`Bridge`].
#[derive(Clone)]
pub struct Reconciler {
    ctl: Arc<dyn BridgeControl>,
    wait: WaitPolicy,
}

impl Reconciler {
    pub fn new(ctl: Arc<dyn BridgeControl>) -> Self {
        Self {
            ctl,
            wait: WaitPolicy::default(),
        }
    }

    /// Override the member wait budget.
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }

    /// Current state of a bridge, `None` if it does not exist.
    pub async fn discover(&self, device: &str) -> Result<Option<Bridge>> {
        self.ctl.query(device).await
    }

    /// Converge the host bridge to `desired`.
    ///
    /// Members that never appear within the [`WaitPolicy`] are skipped; the
    /// rest of the pass still runs and the call then fails with
    /// [`NetError::MemberTimeout`].
    pub async fn converge(&self, desired: &Bridge, mode: ConvergeMode) -> Result<ConvergeReport> {
        let device = desired.device.as_str();
        if device.is_empty() {
            return Err(NetError::Config("bridge device name is empty".into()));
        }

        let mut report = ConvergeReport::new(device);
        let current = self.ctl.query(device).await?;

        let current_members = match &current {
            Some(observed) => {
                debug!(device, observed = %observed, "bridge found");
                observed.members.clone()
            }
            None => {
                info!(device, "bridge missing, creating");
                self.ctl.create(device).await?;
                report.created = true;
                Vec::new()
            }
        };

        let needs_address = match &current {
            Some(observed) => desired.address_differs(observed),
            None => true,
        };
        if needs_address {
            if let Some(ip) = desired.ip {
                let netmask = desired
                    .netmask
                    .or_else(|| default_mask(ip))
                    .ok_or_else(|| NetError::Config(format!("no netmask for {ip} on {device}")))?;
                self.ctl.set_address(device, ip, netmask).await?;
                report.address_set = true;
            }
        }

        let (to_add, to_remove) = member_diff(&desired.members, &current_members);

        let mut ready = Vec::with_capacity(to_add.len());
        let mut missing = Vec::new();
        for member in to_add {
            if self.wait_for_interface(&member).await {
                ready.push(member);
            } else {
                warn!(device, member = %member, "interface never appeared");
                missing.push(member);
            }
        }
        if !ready.is_empty() {
            self.ctl.add_members(device, &ready).await?;
            report.added = ready;
        }

        if !to_remove.is_empty() {
            match mode {
                ConvergeMode::Prune => {
                    self.ctl.remove_members(device, &to_remove).await?;
                    report.removed = to_remove;
                }
                ConvergeMode::Additive => {
                    debug!(device, stale = ?to_remove, "leaving undeclared members in place");
                    report.stale = to_remove;
                }
            }
        }

        self.ctl.up(device).await?;
        report.brought_up = true;

        if !missing.is_empty() {
            info!(device, report = %report, "bridge partially converged");
            return Err(NetError::MemberTimeout {
                bridge: device.to_string(),
                members: missing,
                waited: self.wait.budget(),
                partial: Box::new(report),
            });
        }

        info!(device, created = report.created, added = report.added.len(), removed = report.removed.len(), "bridge converged");
        Ok(report)
    }

    /// Destroy a bridge that is known to exist.
    pub async fn destroy(&self, device: &str) -> Result<()> {
        if self.ctl.query(device).await?.is_none() {
            return Err(NetError::NotFound(device.to_string()));
        }
        info!(device, "destroying bridge");
        self.ctl.destroy(device).await
    }

    /// Poll for `name` until it exists or the budget runs out.
    ///
    /// Dropping the returned future abandons the wait.
    async fn wait_for_interface(&self, name: &str) -> bool {
        let attempts = self.wait.attempts.max(1);
        for attempt in 1..=attempts {
            if self.ctl.interface_exists(name).await {
                if attempt > 1 {
                    debug!(member = %name, attempt, "interface appeared");
                }
                return true;
            }
            if attempt < attempts {
                trace!(member = %name, attempt, "interface not present yet");
                tokio::time::sleep(self.wait.interval).await;
            }
        }
        false
    }
}
