//! Multicast group addressing.
//!
//! # Responsibilities
//! - Decide whether a string is a class-D (multicast) IPv4 address
//! - Represent a validated `(group, port)` pair
//!
//! # Design Decisions
//! - Validation never panics; anything that is not a dotted quad is rejected
//! - Hostnames are never resolved

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Port used when the request path names only a group.
pub const DEFAULT_GROUP_PORT: u16 = 1234;

/// Parse `address` as a class-D IPv4 address.
pub fn parse_class_d(address: &str) -> Option<Ipv4Addr> {
    let ip: Ipv4Addr = address.parse().ok()?;
    matches!(ip.octets()[0], 224..=239).then_some(ip)
}

/// Returns true iff `address` is a dotted-quad IPv4 address in 224.0.0.0/4.
pub fn is_class_d(address: &str) -> bool {
    parse_class_d(address).is_some()
}

/// A validated multicast group and UDP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupAddress {
    ip: Ipv4Addr,
    port: u16,
}

impl GroupAddress {
    /// Build a group address, rejecting non-multicast IPs and port 0.
    pub fn new(ip: Ipv4Addr, port: u16) -> Option<Self> {
        (ip.is_multicast() && port != 0).then_some(Self { ip, port })
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address the multicast socket binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_class_d_range() {
        assert!(is_class_d("239.0.0.254"));
        assert!(is_class_d("224.0.0.0"));
        assert!(is_class_d("239.255.255.255"));
        assert!(is_class_d("230.1.2.3"));
    }

    #[test]
    fn rejects_unicast_and_class_e() {
        assert!(!is_class_d("10.0.0.2"));
        assert!(!is_class_d("223.255.255.255"));
        assert!(!is_class_d("240.0.0.1"));
        assert!(!is_class_d("255.255.255.255"));
        assert!(!is_class_d("0.0.0.0"));
    }

    #[test]
    fn rejects_non_addresses() {
        assert!(!is_class_d("index.html"));
        assert!(!is_class_d(""));
        assert!(!is_class_d("ff02::1"));
        assert!(!is_class_d("239.1.1"));
        assert!(!is_class_d("239.1.1.1.1"));
        assert!(!is_class_d("239.1.1.256"));
        assert!(!is_class_d("239.1.1.-1"));
        assert!(!is_class_d(" 239.1.1.1"));
        assert!(!is_class_d("multicast.example.com"));
    }

    #[test]
    fn group_address_requires_multicast_and_port() {
        let ip: Ipv4Addr = "239.1.1.1".parse().unwrap();
        let group = GroupAddress::new(ip, 5000).unwrap();
        assert_eq!(group.to_string(), "239.1.1.1:5000");
        assert_eq!(group.socket_addr(), "239.1.1.1:5000".parse().unwrap());

        assert!(GroupAddress::new(ip, 0).is_none());
        assert!(GroupAddress::new(Ipv4Addr::new(10, 0, 0, 2), 5000).is_none());
    }
}
