//! In-memory [`BridgeControl`] for exercising convergence without a host.

use crate::bridge::Bridge;
use crate::control::BridgeControl;
use crate::error::{NetError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// A recorded mutating or query call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(String),
    Create(String),
    Destroy(String),
    SetAddress(String, Ipv4Addr, Ipv4Addr),
    AddMembers(String, Vec<String>),
    RemoveMembers(String, Vec<String>),
    Up(String),
}

#[derive(Default)]
struct State {
    bridges: BTreeMap<String, Bridge>,
    interfaces: BTreeSet<String>,
    appear_after: HashMap<String, u32>,
    probes: HashMap<String, u32>,
    failing: BTreeSet<String>,
    calls: Vec<Call>,
}

/// Fake host that records every call and applies it to in-memory bridges.
#[derive(Default)]
pub struct FakeControl {
    state: Mutex<State>,
}

impl FakeControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing bridge.
    pub fn set_bridge(&self, bridge: Bridge) {
        self.lock().bridges.insert(bridge.device.clone(), bridge);
    }

    /// Current in-memory state of a bridge.
    pub fn bridge(&self, device: &str) -> Option<Bridge> {
        self.lock().bridges.get(device).cloned()
    }

    /// Mark interfaces as present.
    pub fn add_interfaces(&self, names: &[&str]) {
        let mut state = self.lock();
        for name in names {
            state.interfaces.insert(name.to_string());
        }
    }

    /// `name` is reported missing for the first `probes` existence checks.
    pub fn appear_after(&self, name: &str, probes: u32) {
        self.lock().appear_after.insert(name.to_string(), probes);
    }

    /// Make every mutating call on `device` fail.
    pub fn fail_device(&self, device: &str) {
        self.lock().failing.insert(device.to_string());
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of existence probes made for `name`.
    pub fn probes(&self, name: &str) -> u32 {
        self.lock().probes.get(name).copied().unwrap_or(0)
    }

    fn mutate(&self, call: Call, device: &str, apply: impl FnOnce(&mut State)) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(call.clone());
        if state.failing.contains(device) {
            return Err(NetError::Command {
                command: format!("{call:?}"),
                status: "exit status: 1".into(),
                stderr: "injected failure".into(),
            });
        }
        apply(&mut state);
        Ok(())
    }
}

#[async_trait]
impl BridgeControl for FakeControl {
    async fn query(&self, device: &str) -> Result<Option<Bridge>> {
        let mut state = self.lock();
        state.calls.push(Call::Query(device.to_string()));
        Ok(state.bridges.get(device).cloned())
    }

    async fn create(&self, device: &str) -> Result<()> {
        self.mutate(Call::Create(device.into()), device, |s| {
            s.bridges.insert(device.to_string(), Bridge::new(device));
        })
    }

    async fn destroy(&self, device: &str) -> Result<()> {
        self.mutate(Call::Destroy(device.into()), device, |s| {
            s.bridges.remove(device);
        })
    }

    async fn set_address(&self, device: &str, ip: Ipv4Addr, netmask: Ipv4Addr) -> Result<()> {
        self.mutate(Call::SetAddress(device.into(), ip, netmask), device, |s| {
            if let Some(b) = s.bridges.get_mut(device) {
                b.ip = Some(ip);
                b.netmask = Some(netmask);
            }
        })
    }

    async fn add_members(&self, device: &str, members: &[String]) -> Result<()> {
        self.mutate(Call::AddMembers(device.into(), members.to_vec()), device, |s| {
            if let Some(b) = s.bridges.get_mut(device) {
                for m in members {
                    b.add_member(m);
                }
            }
        })
    }

    async fn remove_members(&self, device: &str, members: &[String]) -> Result<()> {
        self.mutate(Call::RemoveMembers(device.into(), members.to_vec()), device, |s| {
            if let Some(b) = s.bridges.get_mut(device) {
                b.members.retain(|m| !members.contains(m));
            }
        })
    }

    async fn up(&self, device: &str) -> Result<()> {
        self.mutate(Call::Up(device.into()), device, |_| {})
    }

    async fn interface_exists(&self, name: &str) -> bool {
        let mut state = self.lock();
        let seen = {
            let probes = state.probes.entry(name.to_string()).or_insert(0);
            *probes += 1;
            *probes
        };
        if state.interfaces.contains(name) {
            return true;
        }
        match state.appear_after.get(name) {
            Some(&after) if seen > after => {
                state.interfaces.insert(name.to_string());
                true
            }
            _ => false,
        }
    }
}
