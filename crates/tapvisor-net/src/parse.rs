//! Parsing of bridge-utility interface descriptions.

use crate::bridge::Bridge;
use std::net::Ipv4Addr;

/// Parse `ifconfig <device>` output into a [`Bridge`].
///
/// Every `member:` line contributes its interface name, in order and with
/// duplicates kept. The first well-formed `inet` line supplies the address
/// and the hex netmask (`0xffffff00`). Anything else is ignored. The returned
/// bridge has an empty device name; the caller knows which device it asked
/// about.
pub fn parse_ifconfig(output: &str) -> Bridge {
    let mut bridge = Bridge::default();

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("member:") {
            if let Some(name) = rest.split_whitespace().next() {
                bridge.members.push(name.to_string());
            }
        } else if line.starts_with("inet ") && bridge.ip.is_none() {
            if let Some((ip, mask)) = parse_inet(line) {
                bridge.ip = Some(ip);
                bridge.netmask = mask;
            }
        }
    }

    bridge
}

/// `inet 10.0.0.1 netmask 0xffffff00 broadcast 10.0.0.255`
fn parse_inet(line: &str) -> Option<(Ipv4Addr, Option<Ipv4Addr>)> {
    let mut tokens = line.split_whitespace().skip(1);
    let ip = tokens.next()?.parse().ok()?;

    let mask = match (tokens.next(), tokens.next()) {
        (Some("netmask"), Some(token)) => decode_hex_mask(token),
        _ => None,
    };
    Some((ip, mask))
}

/// Decode `0xffffff00` into `255.255.255.0`.
pub fn decode_hex_mask(token: &str) -> Option<Ipv4Addr> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    let bytes: [u8; 4] = hex::decode(digits).ok()?.try_into().ok()?;
    Some(Ipv4Addr::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIDGE0: &str = "bridge0: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500
\toptions=63<RXCSUM,TXCSUM,TSO4,TSO6>
\tether ce:00:44:60:59:05
\tinet 10.0.0.1 netmask 0xffffff00 broadcast 10.0.0.255
\tConfiguration:
\t\tid 0:0:0:0:0:0 priority 0 hellotime 0 fwddelay 0
\t\tmaxage 0 holdcnt 0 proto stp maxaddr 100 timeout 1200
\t\troot id 0:0:0:0:0:0 priority 0 ifcost 0 port 0
\t\tipfilter disabled flags 0x2
\tmember: en3 flags=3<LEARNING,DISCOVER>
\t        ifmaxaddr 0 port 17 priority 0 path cost 0
\tmember: en1 flags=3<LEARNING,DISCOVER>
\t        ifmaxaddr 0 port 15 priority 0 path cost 0
\tmember: en2 flags=3<LEARNING,DISCOVER>
\t        ifmaxaddr 0 port 16 priority 0 path cost 0
\tmember: en4 flags=3<LEARNING,DISCOVER>
\t        ifmaxaddr 0 port 14 priority 0 path cost 0
\tAddress cache:
\tnd6 options=201<PERFORMNUD,DAD>
\tmedia: <unknown type>
\tstatus: inactive
";

    #[test]
    fn test_parse_bridge0() {
        let bridge = parse_ifconfig(BRIDGE0);
        assert_eq!(bridge.members, vec!["en3", "en1", "en2", "en4"]);
        assert_eq!(bridge.ip, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(bridge.netmask, Some(Ipv4Addr::new(255, 255, 255, 0)));
    }

    #[test]
    fn test_parse_without_inet() {
        let out = "bridge1: flags=8822<BROADCAST,SMART,SIMPLEX,MULTICAST> mtu 1500\n\tmember: tap0 flags=3<LEARNING,DISCOVER>\n\tmember: tap0 flags=3<LEARNING,DISCOVER>\n";
        let bridge = parse_ifconfig(out);
        assert_eq!(bridge.members, vec!["tap0", "tap0"]);
        assert!(bridge.ip.is_none());
        assert!(bridge.netmask.is_none());
    }

    #[test]
    fn test_parse_first_inet_wins_and_inet6_ignored() {
        let out = "\tinet6 fe80::1%bridge0 prefixlen 64 scopeid 0x9\n\
                   \tinet 192.168.64.1 netmask 0xffff0000 broadcast 192.168.255.255\n\
                   \tinet 10.9.9.9 netmask 0xff000000\n";
        let bridge = parse_ifconfig(out);
        assert_eq!(bridge.ip, Some(Ipv4Addr::new(192, 168, 64, 1)));
        assert_eq!(bridge.netmask, Some(Ipv4Addr::new(255, 255, 0, 0)));
    }

    #[test]
    fn test_parse_garbage() {
        let bridge = parse_ifconfig("nothing to see here\ninet\nmember:\n\n");
        assert_eq!(bridge, Bridge::default());
    }

    #[test]
    fn test_decode_hex_mask() {
        assert_eq!(
            decode_hex_mask("0xffffff00"),
            Some(Ipv4Addr::new(255, 255, 255, 0))
        );
        assert_eq!(decode_hex_mask("ffff0000"), Some(Ipv4Addr::new(255, 255, 0, 0)));
        assert_eq!(decode_hex_mask("0xffffff"), None);
        assert_eq!(decode_hex_mask("0xzzzzzzzz"), None);
    }
}
