//! Bridge state and membership arithmetic.

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

/// A host bridge device, either observed or desired.
///
/// Member order carries no meaning; duplicates are tolerated and ignored by
/// [`member_diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bridge {
    /// Device name, e.g. `bridge0`
    pub device: String,
    /// IPv4 address assigned to the bridge
    pub ip: Option<Ipv4Addr>,
    /// Netmask paired with `ip`
    pub netmask: Option<Ipv4Addr>,
    /// Member interface names
    pub members: Vec<String>,
}

impl Bridge {
    /// A bridge with no address and no members.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the address and netmask.
    pub fn with_address(mut self, ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        self.ip = Some(ip);
        self.netmask = Some(netmask);
        self
    }

    /// Append a member interface.
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }

    /// Add a member unless it is already listed.
    pub fn add_member(&mut self, member: &str) {
        if !self.members.iter().any(|m| m == member) {
            self.members.push(member.to_string());
        }
    }

    /// Whether the address differs from `other`'s.
    pub fn address_differs(&self, other: &Bridge) -> bool {
        self.ip != other.ip || self.netmask != other.netmask
    }
}

impl fmt::Display for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.device)?;
        if let Some(ip) = self.ip {
            write!(f, " {ip}")?;
            if let Some(mask) = self.netmask {
                write!(f, "/{}", prefix_len(mask))?;
            }
        }
        if !self.members.is_empty() {
            write!(f, " [{}]", self.members.join(", "))?;
        }
        Ok(())
    }
}

/// Split membership into what must be added and what is stale.
///
/// Returns `(desired - current, current - desired)` over unique names,
/// sorted so the resulting commands are reproducible.
pub fn member_diff(desired: &[String], current: &[String]) -> (Vec<String>, Vec<String>) {
    let desired: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
    let current: BTreeSet<&str> = current.iter().map(String::as_str).collect();

    let to_add = desired
        .difference(&current)
        .map(|s| s.to_string())
        .collect();
    let to_remove = current
        .difference(&desired)
        .map(|s| s.to_string())
        .collect();
    (to_add, to_remove)
}

/// Netmask for a CIDR prefix length (0-32).
pub fn mask_from_prefix(prefix: u8) -> Option<Ipv4Addr> {
    match prefix {
        0 => Some(Ipv4Addr::UNSPECIFIED),
        1..=32 => Some(Ipv4Addr::from(u32::MAX << (32 - u32::from(prefix)))),
        _ => None,
    }
}

/// Classful default netmask, `None` for multicast and reserved space.
pub fn default_mask(ip: Ipv4Addr) -> Option<Ipv4Addr> {
    match ip.octets()[0] {
        0..=127 => mask_from_prefix(8),
        128..=191 => mask_from_prefix(16),
        192..=223 => mask_from_prefix(24),
        _ => None,
    }
}

/// Number of leading one bits in a netmask.
pub fn prefix_len(mask: Ipv4Addr) -> u32 {
    u32::from(mask).leading_ones()
}

/// Netmask in the `0xffffff00` form the bridge utility prints and accepts.
pub fn mask_to_hex(mask: Ipv4Addr) -> String {
    format!("0x{}", hex::encode(mask.octets()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_ignores_duplicates_and_order() {
        let (add, remove) = member_diff(&names(&["a", "a", "c"]), &names(&["c", "a", "c"]));
        assert!(add.is_empty());
        assert!(remove.is_empty());

        let (add, remove) = member_diff(&names(&["z", "z", "x"]), &names(&["x", "z", "z"]));
        assert!(add.is_empty());
        assert!(remove.is_empty());
    }

    #[test]
    fn test_diff_new_and_stale() {
        let (add, remove) = member_diff(&names(&["x", "z"]), &names(&["z"]));
        assert_eq!(add, names(&["x"]));
        assert!(remove.is_empty());

        let (add, remove) = member_diff(&names(&["x", "z"]), &[]);
        assert_eq!(add, names(&["x", "z"]));
        assert!(remove.is_empty());

        let (add, remove) = member_diff(&[], &names(&["x", "z"]));
        assert!(add.is_empty());
        assert_eq!(remove, names(&["x", "z"]));
    }

    #[test]
    fn test_diff_set_properties() {
        let cases = [
            (names(&["en1", "en2", "tap0"]), names(&["en2", "tap9"])),
            (names(&["tap0", "tap0"]), names(&[])),
            (names(&[]), names(&["en0", "en0", "en1"])),
            (names(&["a", "b", "c"]), names(&["c", "b", "a", "a"])),
        ];

        for (desired, current) in cases {
            let (add, remove) = member_diff(&desired, &current);
            assert!(add.iter().all(|m| !current.contains(m)));
            assert!(remove.iter().all(|m| !desired.contains(m)));
            assert!(desired.iter().all(|m| add.contains(m) || current.contains(m)));
        }
    }

    #[test]
    fn test_diff_identical_sets_are_empty() {
        let x = names(&["tap0", "en1", "tap1"]);
        let (add, remove) = member_diff(&x, &x);
        assert!(add.is_empty() && remove.is_empty());
    }

    #[test]
    fn test_masks() {
        assert_eq!(mask_from_prefix(24), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(mask_from_prefix(16), Some(Ipv4Addr::new(255, 255, 0, 0)));
        assert_eq!(mask_from_prefix(32), Some(Ipv4Addr::BROADCAST));
        assert_eq!(mask_from_prefix(0), Some(Ipv4Addr::UNSPECIFIED));
        assert_eq!(mask_from_prefix(33), None);

        assert_eq!(default_mask(Ipv4Addr::new(10, 0, 0, 1)), mask_from_prefix(8));
        assert_eq!(default_mask(Ipv4Addr::new(172, 16, 0, 1)), mask_from_prefix(16));
        assert_eq!(default_mask(Ipv4Addr::new(192, 168, 0, 1)), mask_from_prefix(24));
        assert_eq!(default_mask(Ipv4Addr::new(224, 0, 0, 1)), None);

        assert_eq!(mask_to_hex(Ipv4Addr::new(255, 255, 255, 0)), "0xffffff00");
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 240, 0)), 20);
    }

    #[test]
    fn test_add_member_dedups() {
        let mut bridge = Bridge::new("bridge0").with_member("tap0");
        bridge.add_member("tap0");
        bridge.add_member("tap1");
        assert_eq!(bridge.members, names(&["tap0", "tap1"]));
    }

    #[test]
    fn test_display() {
        let bridge = Bridge::new("bridge0")
            .with_address(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0))
            .with_member("tap0");
        assert_eq!(bridge.to_string(), "bridge0 10.0.0.1/24 [tap0]");
    }
}
