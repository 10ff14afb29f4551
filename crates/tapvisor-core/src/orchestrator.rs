//! Applies a [`Topology`] to the host, one VM and one network at a time.

use crate::config::Topology;
use crate::error::{CoreError, Result};
use std::fmt;
use std::path::Path;
use tapvisor_net::{Bridge, ConvergeMode, ConvergeReport, NetworkSpec, Reconciler};
use tapvisor_vm::{apply_identity, UpOutcome, VmController, VmSpec, VmStatus};

/// What happened to one VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmAction {
    Started(u32),
    AlreadyRunning(u32),
    /// Dry run: the command line that would have been executed
    Planned(Vec<String>),
    Signalled,
    Valid,
}

impl From<UpOutcome> for VmAction {
    fn from(outcome: UpOutcome) -> Self {
        match outcome {
            UpOutcome::Started(pid) => VmAction::Started(pid),
            UpOutcome::AlreadyRunning(pid) => VmAction::AlreadyRunning(pid),
        }
    }
}

impl fmt::Display for VmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmAction::Started(pid) => write!(f, "started (pid {pid})"),
            VmAction::AlreadyRunning(pid) => write!(f, "already running (pid {pid})"),
            VmAction::Planned(argv) => write!(f, "would run: {}", argv.join(" ")),
            VmAction::Signalled => write!(f, "signalled"),
            VmAction::Valid => write!(f, "ok"),
        }
    }
}

/// What happened to one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAction {
    Converged(ConvergeReport),
    /// Dry run: the bridge state that would have been converged to
    Planned(Bridge),
    /// Backend not managed here
    Skipped(&'static str),
}

impl fmt::Display for NetworkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkAction::Converged(report) if report.is_noop() => write!(f, "up to date"),
            NetworkAction::Converged(report) => write!(f, "{report}"),
            NetworkAction::Planned(bridge) => write!(f, "would converge {bridge}"),
            NetworkAction::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Per-item outcome; a failure here does not stop other items.
#[derive(Debug)]
pub struct Outcome<T> {
    pub name: String,
    pub result: Result<T>,
}

impl<T> Outcome<T> {
    fn new(name: &str, result: Result<T>) -> Self {
        Self {
            name: name.to_string(),
            result,
        }
    }

    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }
}

pub type VmOutcome = Outcome<VmAction>;
pub type NetworkOutcome = Outcome<NetworkAction>;

/// Result of [`Orchestrator::up`].
#[derive(Debug, Default)]
pub struct UpReport {
    pub vms: Vec<VmOutcome>,
    pub networks: Vec<NetworkOutcome>,
}

impl UpReport {
    pub fn has_failures(&self) -> bool {
        self.vms.iter().any(Outcome::is_err) || self.networks.iter().any(Outcome::is_err)
    }
}

/// Drives VMs through [`VmController`] and bridges through [`Reconciler`].
pub struct Orchestrator {
    vms: VmController,
    net: Reconciler,
}

impl Orchestrator {
    pub fn new(vms: VmController, net: Reconciler) -> Self {
        Self { vms, net }
    }

    pub fn controller(&self) -> &VmController {
        &self.vms
    }

    /// Bring up the selected VMs, then converge every tap network.
    ///
    /// Bridges only ever gain members here. Members come from every VM
    /// that is running afterwards, selected or not.
    pub async fn up(
        &self,
        topology: &Topology,
        selection: Option<&str>,
        dry_run: bool,
    ) -> Result<UpReport> {
        let selected = topology.select_vms(selection)?;
        let mut report = UpReport::default();
        let mut planned = Vec::new();

        for vm in selected {
            tracing::info!(vm = %vm.name, dry_run, "bringing up");
            let result = self.up_one(topology, vm, dry_run);
            if let Err(e) = &result {
                tracing::error!(vm = %vm.name, error = %e, "failed to bring up");
            }
            if let Ok(VmAction::Planned(_)) = result {
                planned.push(vm.name.as_str());
            }
            report.vms.push(Outcome::new(&vm.name, result));
        }

        let members: Vec<&VmSpec> = topology
            .vms
            .values()
            .filter(|vm| planned.contains(&vm.name.as_str()) || self.vms.status(vm).is_running())
            .collect();

        report.networks = self
            .converge_all(topology, &members, ConvergeMode::Additive, dry_run)
            .await;
        Ok(report)
    }

    fn up_one(&self, topology: &Topology, vm: &VmSpec, dry_run: bool) -> Result<VmAction> {
        let spec = self.prepare(topology, vm)?;
        if dry_run {
            return Ok(VmAction::Planned(self.vms.command_line(&spec)));
        }
        Ok(self.vms.up(&spec)?.into())
    }

    /// Run directory, identity and validation, as `up` needs them.
    fn prepare(&self, topology: &Topology, vm: &VmSpec) -> Result<VmSpec> {
        topology.check_membership(vm)?;
        let mut spec = vm.clone();
        apply_identity(&mut spec)?;
        self.vms.validate(&spec)?;
        Ok(spec)
    }

    /// Signal the selected VMs.
    pub fn down(
        &self,
        topology: &Topology,
        selection: Option<&str>,
        signal: Option<&str>,
    ) -> Result<Vec<VmOutcome>> {
        let selected = topology.select_vms(selection)?;
        Ok(selected
            .into_iter()
            .map(|vm| {
                let result = self
                    .vms
                    .down(vm, signal)
                    .map(|()| VmAction::Signalled)
                    .map_err(CoreError::from);
                if let Err(e) = &result {
                    tracing::warn!(vm = %vm.name, error = %e, "failed to stop");
                }
                Outcome::new(&vm.name, result)
            })
            .collect())
    }

    /// Liveness of the selected VMs, in name order.
    pub fn status(
        &self,
        topology: &Topology,
        selection: Option<&str>,
    ) -> Result<Vec<(String, VmStatus)>> {
        let selected = topology.select_vms(selection)?;
        Ok(selected
            .into_iter()
            .map(|vm| (vm.name.clone(), self.vms.status(vm)))
            .collect())
    }

    /// Validate the selected VMs without starting them.
    pub fn validate(
        &self,
        topology: &Topology,
        selection: Option<&str>,
    ) -> Result<Vec<VmOutcome>> {
        let selected = topology.select_vms(selection)?;
        Ok(selected
            .into_iter()
            .map(|vm| {
                let result = self.prepare(topology, vm).map(|_| VmAction::Valid);
                Outcome::new(&vm.name, result)
            })
            .collect())
    }

    /// Converge every tap network from the VMs currently running.
    pub async fn reconcile(
        &self,
        topology: &Topology,
        mode: ConvergeMode,
        dry_run: bool,
    ) -> Result<Vec<NetworkOutcome>> {
        let running: Vec<&VmSpec> = topology
            .vms
            .values()
            .filter(|vm| self.vms.status(vm).is_running())
            .collect();
        Ok(self.converge_all(topology, &running, mode, dry_run).await)
    }

    /// Destroy the bridge of a tap network.
    pub async fn destroy_network(&self, topology: &Topology, name: &str) -> Result<()> {
        let NetworkSpec::Tap(tap) = topology.network(name)? else {
            return Err(CoreError::Config(format!("network {name} is not a tap network")));
        };
        self.net.destroy(&tap.bridge).await?;
        Ok(())
    }

    async fn converge_all(
        &self,
        topology: &Topology,
        members: &[&VmSpec],
        mode: ConvergeMode,
        dry_run: bool,
    ) -> Vec<NetworkOutcome> {
        let mut outcomes = Vec::new();

        for (name, network) in &topology.networks {
            let result = match network {
                NetworkSpec::Tap(tap) => match tap.to_bridge() {
                    Ok(bridge) => {
                        let bridge = with_members(bridge, name, members);
                        if dry_run {
                            Ok(NetworkAction::Planned(bridge))
                        } else {
                            self.net
                                .converge(&bridge, mode)
                                .await
                                .map(NetworkAction::Converged)
                                .map_err(CoreError::from)
                        }
                    }
                    Err(e) => Err(e.into()),
                },
                NetworkSpec::Vmnet(_) => Ok(NetworkAction::Skipped("managed by the hypervisor")),
                NetworkSpec::Vpnkit(_) => Ok(NetworkAction::Skipped("vpnkit is not implemented")),
            };

            match &result {
                Ok(action) => tracing::info!(network = %name, %action, "network done"),
                Err(e) => tracing::error!(network = %name, error = %e, "failed to converge"),
            }
            outcomes.push(Outcome::new(name, result));
        }

        outcomes
    }
}

/// Add each member VM's tap devices on `network` to `bridge`.
fn with_members(mut bridge: Bridge, network: &str, members: &[&VmSpec]) -> Bridge {
    for vm in members {
        for device in vm.devices_in(network) {
            bridge.add_member(interface_name(device));
        }
    }
    bridge
}

/// `/dev/tap0` and `tap0` both name interface `tap0`.
fn interface_name(device: &str) -> &str {
    Path::new(device)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(device)
}
