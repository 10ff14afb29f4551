//! Bridge utility abstraction and the `ifconfig` implementation.

use crate::bridge::{mask_to_hex, Bridge};
use crate::error::{NetError, Result};
use crate::parse::parse_ifconfig;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, trace};

/// Operations the reconciler needs from the host.
///
/// Mutating calls are expected to be idempotent: creating an existing
/// bridge or adding an existing member succeeds.
#[async_trait]
pub trait BridgeControl: Send + Sync {
    /// Current state of `device`, `None` if no such device exists.
    async fn query(&self, device: &str) -> Result<Option<Bridge>>;

    /// Create the bridge device.
    async fn create(&self, device: &str) -> Result<()>;

    /// Destroy the bridge device.
    async fn destroy(&self, device: &str) -> Result<()>;

    /// Assign an IPv4 address and netmask.
    async fn set_address(&self, device: &str, ip: Ipv4Addr, netmask: Ipv4Addr) -> Result<()>;

    /// Add all `members` in a single call.
    async fn add_members(&self, device: &str, members: &[String]) -> Result<()>;

    /// Remove all `members` in a single call.
    async fn remove_members(&self, device: &str, members: &[String]) -> Result<()>;

    /// Bring the device administratively up.
    async fn up(&self, device: &str) -> Result<()>;

    /// Whether a network interface named `name` currently exists.
    async fn interface_exists(&self, name: &str) -> bool;
}

/// [`BridgeControl`] backed by the BSD/Darwin `ifconfig` utility.
#[derive(Debug, Clone)]
pub struct Ifconfig {
    binary: PathBuf,
}

impl Default for Ifconfig {
    fn default() -> Self {
        Self::new("ifconfig")
    }
}

impl Ifconfig {
    /// Use the utility at `binary` (a bare name is looked up on `PATH`).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn render(&self, args: &[String]) -> String {
        let mut cmd = self.binary.display().to_string();
        for arg in args {
            cmd.push(' ');
            cmd.push_str(arg);
        }
        cmd
    }

    /// Run a mutating subcommand, failing on non-zero exit.
    async fn run(&self, args: Vec<String>) -> Result<()> {
        let command = self.render(&args);
        info!(cmd = %command, "running");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| NetError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(cmd = %command, status = %output.status, stderr = %stderr, "command failed");
            return Err(NetError::Command {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BridgeControl for Ifconfig {
    async fn query(&self, device: &str) -> Result<Option<Bridge>> {
        let command = self.render(&[device.to_string()]);
        debug!(cmd = %command, "querying bridge");

        let output = Command::new(&self.binary)
            .arg(device)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| NetError::Spawn { command, source })?;

        if !output.status.success() {
            trace!(
                device,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "device not present"
            );
            return Ok(None);
        }

        let mut bridge = parse_ifconfig(&String::from_utf8_lossy(&output.stdout));
        bridge.device = device.to_string();
        Ok(Some(bridge))
    }

    async fn create(&self, device: &str) -> Result<()> {
        self.run(vec![device.to_string(), "create".into()]).await
    }

    async fn destroy(&self, device: &str) -> Result<()> {
        self.run(vec![device.to_string(), "destroy".into()]).await
    }

    async fn set_address(&self, device: &str, ip: Ipv4Addr, netmask: Ipv4Addr) -> Result<()> {
        self.run(vec![
            device.to_string(),
            ip.to_string(),
            "netmask".into(),
            mask_to_hex(netmask),
        ])
        .await
    }

    async fn add_members(&self, device: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.run(member_args(device, "addm", members)).await
    }

    async fn remove_members(&self, device: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.run(member_args(device, "deletem", members)).await
    }

    async fn up(&self, device: &str) -> Result<()> {
        self.run(vec![device.to_string(), "up".into()]).await
    }

    async fn interface_exists(&self, name: &str) -> bool {
        nix::net::if_::if_nametoindex(name).is_ok()
    }
}

/// `bridge0 addm tap0 addm tap1`
fn member_args(device: &str, verb: &str, members: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(1 + members.len() * 2);
    args.push(device.to_string());
    for member in members {
        args.push(verb.to_string());
        args.push(member.clone());
    }
    args
}
