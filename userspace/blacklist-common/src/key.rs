/// Packets dropped for a banned source. Only the XDP program increments it.
pub type DropCount = u32;

/// Key of the blacklist map: an IPv4 source address in network byte order.
///
/// Fixed at 4 bytes, there is no IPv6 representation.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "user", derive(Debug, Hash))]
pub struct BlacklistKey([u8; 4]);

impl BlacklistKey {
    pub const fn new(octets: [u8; 4]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }
}

impl From<[u8; 4]> for BlacklistKey {
    fn from(octets: [u8; 4]) -> Self {
        Self(octets)
    }
}

#[cfg(feature = "user")]
impl From<std::net::Ipv4Addr> for BlacklistKey {
    fn from(ip: std::net::Ipv4Addr) -> Self {
        Self(ip.octets())
    }
}

#[cfg(feature = "user")]
impl From<BlacklistKey> for std::net::Ipv4Addr {
    fn from(key: BlacklistKey) -> Self {
        std::net::Ipv4Addr::from(key.0)
    }
}

// Safety: BlacklistKey is repr(transparent) over [u8; 4]
#[cfg(feature = "user")]
unsafe impl aya::Pod for BlacklistKey {}
