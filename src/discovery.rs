//! Network Discovery: enumerates active IPv4 interfaces and builds the
//! candidate robot/radio address sets.

use std::net::Ipv4Addr;

/// `static_ip(a, team, d)` = `"{a}.{team/100}.{team%100}.{d}"`.
pub fn static_ip(a: u8, team: u32, d: u8) -> String {
    format!("{a}.{}.{}.{d}", team / 100, team % 100, d = d)
}

/// Radio static address, `10.TE.AM.1`.
pub fn radio_static_ip(team: u32) -> String {
    static_ip(10, team, 1)
}

#[derive(Debug, Clone)]
pub struct Ipv4Interface {
    pub name: String,
    pub addr: Ipv4Addr,
}

/// Injectable collaborator so discovery is testable without real network
/// interfaces.
pub trait InterfaceSource: Send + Sync {
    /// Returns one entry per IPv4 address found on an interface that is
    /// `{Up, Running}` and not the loopback interface.
    fn enumerate(&self) -> Vec<Ipv4Interface>;
}

/// Real system enumeration via `if-addrs`.
#[derive(Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn enumerate(&self) -> Vec<Ipv4Interface> {
        let Ok(ifaces) = if_addrs::get_if_addrs() else {
            return Vec::new();
        };

        ifaces
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .filter_map(|iface| match iface.addr {
                if_addrs::IfAddr::V4(v4) => Some(Ipv4Interface {
                    name: iface.name,
                    addr: v4.ip,
                }),
                if_addrs::IfAddr::V6(_) => None,
            })
            .collect()
    }
}

/// Result of one discovery pass: the two address lists plus the interface
/// count, ready to be installed verbatim on `ProtocolCore`.
pub struct DiscoveryResult {
    pub radio_ips: Vec<String>,
    pub robot_ips: Vec<String>,
    pub interface_count: u32,
}

/// Runs the address-sweep-seed regeneration algorithm.
pub fn regenerate(
    team: u32,
    extra_radio_ips: &[String],
    extra_robot_ips: &[String],
    interfaces: &dyn InterfaceSource,
) -> DiscoveryResult {
    let mut radio_ips = Vec::new();
    let mut robot_ips = Vec::new();
    let mut counted_names = std::collections::HashSet::new();

    radio_ips.extend(extra_radio_ips.iter().cloned());
    radio_ips.push(radio_static_ip(team));

    robot_ips.extend(extra_robot_ips.iter().cloned());
    robot_ips.push("127.0.0.1".to_string());

    for iface in interfaces.enumerate() {
        if iface.addr.is_loopback() {
            continue;
        }
        let [a, b, c, _] = iface.addr.octets();
        for d in 1..=254u8 {
            robot_ips.push(format!("{a}.{b}.{c}.{d}"));
        }
        // A multi-homed interface yields one `Ipv4Interface` per address;
        // count the interface itself once regardless of how many addresses
        // it contributed.
        counted_names.insert(iface.name.clone());
    }

    DiscoveryResult {
        radio_ips,
        robot_ips,
        interface_count: counted_names.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(Vec<Ipv4Interface>);
    impl InterfaceSource for Fake {
        fn enumerate(&self) -> Vec<Ipv4Interface> {
            self.0.clone()
        }
    }

    #[test]
    fn static_ip_matches_team_split() {
        assert_eq!(static_ip(10, 3794, 1), "10.37.94.1");
        assert_eq!(static_ip(10, 118, 1), "10.1.18.1");
        assert_eq!(radio_static_ip(3794), "10.37.94.1");
    }

    #[test]
    fn robot_ips_always_contains_loopback() {
        let result = regenerate(118, &[], &[], &Fake(vec![]));
        assert!(result.robot_ips.contains(&"127.0.0.1".to_string()));
    }

    #[test]
    fn radio_ips_contains_team_address_after_set_team() {
        let result = regenerate(3794, &[], &[], &Fake(vec![]));
        assert!(result.radio_ips.contains(&"10.37.94.1".to_string()));
    }

    #[test]
    fn one_interface_contributes_a_full_slash_24_once() {
        let iface = Ipv4Interface {
            name: "eth0".into(),
            addr: "192.168.1.50".parse().unwrap(),
        };
        let result = regenerate(118, &[], &[], &Fake(vec![iface]));
        assert_eq!(result.interface_count, 1);
        assert!(result.robot_ips.contains(&"192.168.1.1".to_string()));
        assert!(result.robot_ips.contains(&"192.168.1.254".to_string()));
        assert!(!result.robot_ips.contains(&"192.168.1.0".to_string()));
    }

    #[test]
    fn multihomed_interface_counts_once() {
        let addrs = vec![
            Ipv4Interface { name: "eth0".into(), addr: "192.168.1.50".parse().unwrap() },
            Ipv4Interface { name: "eth0".into(), addr: "192.168.1.51".parse().unwrap() },
        ];
        let result = regenerate(118, &[], &[], &Fake(addrs));
        assert_eq!(result.interface_count, 1);
    }

    #[test]
    fn extras_are_prepended() {
        let extra_robot = vec!["172.22.11.2".to_string()];
        let result = regenerate(118, &[], &extra_robot, &Fake(vec![]));
        assert_eq!(result.robot_ips[0], "172.22.11.2");
        assert_eq!(result.robot_ips[1], "127.0.0.1");
    }
}
