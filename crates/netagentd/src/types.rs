//! Net value types the handlers validate raw goal state strings into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Parse failures for goal state field values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid CIDR block format: {0}")]
    InvalidCidr(String),

    #[error("invalid tunnel id: {0} (must be 1-16777215)")]
    InvalidTunnelId(u32),
}

/// Parses an IP address into the shared error type.
pub fn parse_ip(s: &str) -> Result<IpAddr, ParseError> {
    s.parse()
        .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
}

/// A 48-bit Ethernet MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Creates a MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns true if the least significant bit of the first octet is set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Returns true for a unicast address.
    pub const fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true for the all-zero address.
    pub const fn is_zero(&self) -> bool {
        self.0[0] == 0
            && self.0[1] == 0
            && self.0[2] == 0
            && self.0[3] == 0
            && self.0[4] == 0
            && self.0[5] == 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Controllers send colon format; tolerate hyphens as well.
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseError::InvalidMacAddress(s.to_string()));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

/// An IPv4 or IPv6 CIDR block (e.g. `10.0.0.0/16` or `2001:db8::/32`).
///
/// Controllers routinely send blocks with host bits set (`10.0.0.1/16`);
/// the address is kept as given and membership tests mask both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock {
    address: IpAddr,
    prefix_len: u8,
}

impl CidrBlock {
    /// Creates a CIDR block.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length exceeds the maximum for the
    /// address family (32 for IPv4, 128 for IPv6).
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len: u8 = match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max_len {
            return Err(ParseError::InvalidCidr(format!(
                "{address}/{prefix_len}"
            )));
        }
        Ok(CidrBlock {
            address,
            prefix_len,
        })
    }

    /// Returns the address as given (host bits included).
    pub const fn addr(&self) -> IpAddr {
        self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the canonical network address (host bits cleared).
    pub fn network(&self) -> IpAddr {
        match self.address {
            IpAddr::V4(v4) => IpAddr::V4(Ipv4Addr::from(mask_v4(v4, self.prefix_len))),
            IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(mask_v6(v6, self.prefix_len))),
        }
    }

    /// Returns true when `ip` falls inside this block.
    ///
    /// Mixed address families never match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.address, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                mask_v4(net, self.prefix_len) == mask_v4(ip, self.prefix_len)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                mask_v6(net, self.prefix_len) == mask_v6(ip, self.prefix_len)
            }
            _ => false,
        }
    }
}

fn mask_v4(addr: Ipv4Addr, prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        return 0;
    }
    u32::from(addr) & (u32::MAX << (32 - u32::from(prefix_len)))
}

fn mask_v6(addr: Ipv6Addr, prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        return 0;
    }
    u128::from(addr) & (u128::MAX << (128 - u32::from(prefix_len)))
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for CidrBlock {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidCidr(s.to_string()))?;

        let address: IpAddr = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidCidr(s.to_string()))?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidCidr(s.to_string()))?;

        CidrBlock::new(address, prefix_len)
    }
}

impl TryFrom<String> for CidrBlock {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CidrBlock> for String {
    fn from(cidr: CidrBlock) -> String {
        cidr.to_string()
    }
}

/// Overlay tunnel identifier (24-bit VNI space, 1-16777215).
///
/// Wire value 0 means "not assigned yet"; [`TunnelId::from_wire`] maps it
/// to `None` rather than an error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct TunnelId(u32);

impl TunnelId {
    /// Minimum valid tunnel id.
    pub const MIN: u32 = 1;

    /// Maximum valid tunnel id (24-bit space).
    pub const MAX: u32 = (1 << 24) - 1;

    /// Creates a tunnel id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is outside 1-16777215.
    pub const fn new(id: u32) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(TunnelId(id))
        } else {
            Err(ParseError::InvalidTunnelId(id))
        }
    }

    /// Maps a wire value to an optional tunnel id; 0 means unassigned.
    pub fn from_wire(raw: u32) -> Result<Option<Self>, ParseError> {
        if raw == 0 {
            Ok(None)
        } else {
            match Self::new(raw) {
                Ok(id) => Ok(Some(id)),
                Err(e) => Err(e),
            }
        }
    }

    /// Returns the id as a u32.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for TunnelId {
    type Error = ParseError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        TunnelId::new(id)
    }
}

impl From<TunnelId> for u32 {
    fn from(id: TunnelId) -> u32 {
        id.0
    }
}
