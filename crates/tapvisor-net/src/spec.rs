//! Declared networks.

use crate::bridge::{default_mask, mask_from_prefix, Bridge};
use crate::error::{NetError, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// A declared network; exactly one backend.
///
/// Serialized externally tagged, so a TOML table `[network.lan.tap]`
/// selects [`NetworkSpec::Tap`] and a table naming two backends is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkSpec {
    /// vmnet.framework networking, managed by the hypervisor itself
    Vmnet(Vmnet),
    /// Tap devices joined to a host bridge
    Tap(Tap),
    /// VPNKit user-space networking
    Vpnkit(VpnKit),
}

impl NetworkSpec {
    /// Backend name as written in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            NetworkSpec::Vmnet(_) => "vmnet",
            NetworkSpec::Tap(_) => "tap",
            NetworkSpec::Vpnkit(_) => "vpnkit",
        }
    }

    pub fn as_tap(&self) -> Option<&Tap> {
        match self {
            NetworkSpec::Tap(tap) => Some(tap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vmnet {
    pub bridge: Option<String>,
    pub ip: Option<String>,
}

/// Tap-backed network joined to a host bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tap {
    /// Bridge device name, e.g. `bridge1`
    pub bridge: String,
    /// `10.0.0.1/24` or a bare address (classful mask)
    pub ip: Option<String>,
    pub nat: bool,
    pub nat_if: Option<String>,
    pub pf_rules: Vec<String>,
    pub dhcp: bool,
}

impl Tap {
    /// Desired bridge state for this network, without members.
    pub fn to_bridge(&self) -> Result<Bridge> {
        if self.bridge.is_empty() {
            return Err(NetError::Config("tap network has no bridge device".into()));
        }

        let bridge = Bridge::new(&self.bridge);
        let Some(ip) = self.ip.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(bridge);
        };

        let (ip, netmask) = parse_address(ip)?;
        Ok(bridge.with_address(ip, netmask))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnKit {}

/// Parse `a.b.c.d/len` or a bare `a.b.c.d`.
fn parse_address(text: &str) -> Result<(Ipv4Addr, Ipv4Addr)> {
    let bad = |reason: &str| NetError::Config(format!("could not parse IP address {text}: {reason}"));

    match text.split_once('/') {
        Some((addr, prefix)) => {
            let ip: Ipv4Addr = addr.parse().map_err(|_| bad("invalid IPv4 address"))?;
            let mask = prefix
                .parse::<u8>()
                .ok()
                .and_then(mask_from_prefix)
                .ok_or_else(|| bad("invalid prefix length"))?;
            Ok((ip, mask))
        }
        None => {
            let ip: Ipv4Addr = text.parse().map_err(|_| bad("invalid IPv4 address"))?;
            let mask = default_mask(ip).ok_or_else(|| bad("no default netmask"))?;
            Ok((ip, mask))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap(bridge: &str, ip: Option<&str>) -> Tap {
        Tap {
            bridge: bridge.into(),
            ip: ip.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_to_bridge_without_ip() {
        assert_eq!(tap("bridge0", None).to_bridge().unwrap(), Bridge::new("bridge0"));
    }

    #[test]
    fn test_to_bridge_bare_ip_gets_default_mask() {
        let bridge = tap("bridge0", Some("192.168.0.1")).to_bridge().unwrap();
        assert_eq!(bridge.ip, Some(Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(bridge.netmask, Some(Ipv4Addr::new(255, 255, 255, 0)));
    }

    #[test]
    fn test_to_bridge_cidr() {
        let bridge = tap("bridge0", Some("10.0.0.1/16")).to_bridge().unwrap();
        assert_eq!(bridge.ip, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(bridge.netmask, Some(Ipv4Addr::new(255, 255, 0, 0)));
    }

    #[test]
    fn test_to_bridge_rejects_garbage() {
        assert!(tap("bridge0", Some("10.0.0/24")).to_bridge().is_err());
        assert!(tap("bridge0", Some("10.0.0.1/40")).to_bridge().is_err());
        assert!(tap("bridge0", Some("239.1.1.1")).to_bridge().is_err());
        assert!(tap("", Some("10.0.0.1")).to_bridge().is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Doc {
        network: NetworkSpec,
    }

    #[test]
    fn test_deserialize_single_backend() {
        let doc: Doc = toml::from_str(
            r#"
            [network.tap]
            bridge = "bridge1"
            ip = "10.10.0.1/24"
            nat = true
            pf_rules = ["pass all"]
            "#,
        )
        .unwrap();

        let tap = doc.network.as_tap().expect("tap backend");
        assert_eq!(tap.bridge, "bridge1");
        assert!(tap.nat);
        assert!(!tap.dhcp);
        assert_eq!(tap.pf_rules, vec!["pass all"]);
        assert_eq!(doc.network.kind(), "tap");

        let doc: Doc = toml::from_str("[network.vpnkit]\n").unwrap();
        assert_eq!(doc.network, NetworkSpec::Vpnkit(VpnKit {}));
    }

    #[test]
    fn test_deserialize_rejects_two_backends() {
        let result: std::result::Result<Doc, _> = toml::from_str(
            r#"
            [network.tap]
            bridge = "bridge1"
            [network.vmnet]
            "#,
        );
        assert!(result.is_err());
    }
}
