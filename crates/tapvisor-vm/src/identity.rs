//! Persisted VM identity: UUID and per-network MAC addresses.
//!
//! Values are generated once and stored as plain text under the run
//! directory, so repeated runs hand the guest the same identity.

use crate::config::{mac_file, VmSpec, UUID_FILE};
use crate::error::{Result, VmError};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// A 48-bit Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Random unicast, locally administered address.
    pub fn random_local() -> Self {
        let mut bytes: [u8; 6] = rand::random();
        bytes[0] = (bytes[0] | 0x02) & 0xfe;
        Self(bytes)
    }

    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = String;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(format!("expected 6 octets, got {}", parts.len()));
        }

        let mut bytes = [0u8; 6];
        for (slot, part) in bytes.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(format!("invalid octet {part:?}"));
            }
            let decoded = hex::decode(part).map_err(|e| format!("invalid octet {part:?}: {e}"))?;
            *slot = decoded[0];
        }
        Ok(Self(bytes))
    }
}

/// Read `<run_dir>/uuid`, or generate and persist a new v4 UUID.
pub fn load_or_create_uuid(run_dir: &Path) -> Result<Uuid> {
    let path = run_dir.join(UUID_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => Uuid::parse_str(text.trim()).map_err(|e| VmError::Identity {
            path,
            reason: e.to_string(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let id = Uuid::new_v4();
            fs::write(&path, id.to_string())?;
            tracing::debug!(path = %path.display(), %id, "generated uuid");
            Ok(id)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read `<run_dir>/<network>_mac`, or generate and persist a new address.
pub fn load_or_create_mac(run_dir: &Path, network: &str) -> Result<MacAddr> {
    let path = mac_file(run_dir, network);
    match fs::read_to_string(&path) {
        Ok(text) => text
            .trim()
            .parse::<MacAddr>()
            .map_err(|reason| VmError::Identity { path, reason }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let mac = MacAddr::random_local();
            fs::write(&path, mac.to_string())?;
            tracing::debug!(path = %path.display(), %mac, "generated mac");
            Ok(mac)
        }
        Err(e) => Err(e.into()),
    }
}

/// Fill in a missing UUID and missing MACs of network members.
///
/// Creates the run directory if needed. Values already set in the spec
/// are left alone.
pub fn apply_identity(spec: &mut VmSpec) -> Result<()> {
    if spec.run_dir.as_os_str().is_empty() {
        return Err(VmError::Config(format!(
            "VM {} has no run directory",
            spec.name
        )));
    }
    fs::create_dir_all(&spec.run_dir)?;

    if spec.uuid.is_empty() {
        spec.uuid = load_or_create_uuid(&spec.run_dir)?.to_string();
    }

    for net in &mut spec.network {
        let missing = net.mac.as_deref().map_or(true, str::is_empty);
        if let (true, Some(network)) = (missing, net.member_of.as_deref()) {
            net.mac = Some(load_or_create_mac(&spec.run_dir, network)?.to_string());
        }
    }

    Ok(())
}
