//! Address normalization
//!
//! Every address becomes a left-aligned path of up to 128 bits through the network
//! trie. IPv4 addresses live at `::ffff:0:0/96`, i.e. behind 80 zero bits and
//! 16 one bits, so both families share one tree.

use crate::error::{LocError, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Full address width in bits
pub const ADDRESS_BITS: u8 = 128;
/// Length of the IPv4 embedding prefix
pub const IPV4_PREFIX_LEN: u8 = 96;
/// The 96 high bits shared by every embedded IPv4 address
const IPV4_PREFIX: u128 = 0xFFFF;

/// A bit sequence, most significant bit first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitPath {
    /// Bits left-aligned in a 128-bit word; bits past `len` are zero
    bits: u128,
    len: u8,
}

impl BitPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ipv4(ip: Ipv4Addr) -> Self {
        Self {
            bits: (IPV4_PREFIX << 32) | u32::from(ip) as u128,
            len: ADDRESS_BITS,
        }
    }

    pub fn from_ipv6(ip: Ipv6Addr) -> Self {
        Self {
            bits: u128::from(ip),
            len: ADDRESS_BITS,
        }
    }

    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::from_ipv4(v4),
            IpAddr::V6(v6) => Self::from_ipv6(v6),
        }
    }

    /// Parse dotted-decimal, colon-hex (a `/prefix` suffix is ignored) or a raw
    /// `0`/`1` bit string
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if !text.is_empty() && text.bytes().all(|b| b == b'0' || b == b'1') {
            return Self::from_bit_str(text);
        }

        let address = text.split('/').next().unwrap_or_default();
        address
            .parse::<IpAddr>()
            .map(Self::from_ip)
            .map_err(|_| LocError::InvalidAddress(text.to_string()))
    }

    fn from_bit_str(text: &str) -> Result<Self> {
        if text.len() > ADDRESS_BITS as usize {
            return Err(LocError::InvalidAddress(format!(
                "bit string longer than {} bits",
                ADDRESS_BITS
            )));
        }
        let mut path = Self::new();
        for b in text.bytes() {
            path.push(b == b'1');
        }
        Ok(path)
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bit at `index`, counted from the most significant end
    pub fn bit(&self, index: u8) -> bool {
        debug_assert!(index < self.len);
        (self.bits >> (ADDRESS_BITS - 1 - index)) & 1 == 1
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|i| self.bit(i))
    }

    /// Extend by one bit; a full path is left unchanged
    pub fn push(&mut self, bit: bool) {
        if self.len >= ADDRESS_BITS {
            return;
        }
        if bit {
            self.bits |= 1u128 << (ADDRESS_BITS - 1 - self.len);
        }
        self.len += 1;
    }

    pub fn with(mut self, bit: bool) -> Self {
        self.push(bit);
        self
    }

    /// Keep only the first `len` bits
    pub fn truncate(&mut self, len: u8) {
        if len >= self.len {
            return;
        }
        self.bits = if len == 0 {
            0
        } else {
            self.bits & (u128::MAX << (ADDRESS_BITS - len))
        };
        self.len = len;
    }

    /// Whether the path lies under the IPv4 embedding prefix
    pub fn is_ipv4(&self) -> bool {
        self.len >= IPV4_PREFIX_LEN && self.bits >> 32 == IPV4_PREFIX
    }

    /// The address this path points at, zero-filled to full width
    pub fn to_ip(&self) -> IpAddr {
        if self.is_ipv4() {
            IpAddr::V4(Ipv4Addr::from(self.bits as u32))
        } else {
            IpAddr::V6(Ipv6Addr::from(self.bits))
        }
    }

    /// Prefix length in the address family of [`to_ip`](Self::to_ip)
    pub fn family_prefix_len(&self) -> u8 {
        if self.is_ipv4() {
            self.len - IPV4_PREFIX_LEN
        } else {
            self.len
        }
    }
}

impl fmt::Display for BitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for BitPath {
    type Err = LocError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Anything that can be looked up in the database
pub trait ToBitPath {
    fn to_bit_path(&self) -> Result<BitPath>;
}

impl ToBitPath for BitPath {
    fn to_bit_path(&self) -> Result<BitPath> {
        Ok(*self)
    }
}

impl ToBitPath for str {
    fn to_bit_path(&self) -> Result<BitPath> {
        BitPath::parse(self)
    }
}

impl ToBitPath for String {
    fn to_bit_path(&self) -> Result<BitPath> {
        BitPath::parse(self)
    }
}

/// Integer form of an IPv4 address
impl ToBitPath for u32 {
    fn to_bit_path(&self) -> Result<BitPath> {
        Ok(BitPath::from_ipv4(Ipv4Addr::from(*self)))
    }
}

/// Integer form of an IPv6 address
impl ToBitPath for u128 {
    fn to_bit_path(&self) -> Result<BitPath> {
        Ok(BitPath::from_ipv6(Ipv6Addr::from(*self)))
    }
}

impl ToBitPath for Ipv4Addr {
    fn to_bit_path(&self) -> Result<BitPath> {
        Ok(BitPath::from_ipv4(*self))
    }
}

impl ToBitPath for Ipv6Addr {
    fn to_bit_path(&self) -> Result<BitPath> {
        Ok(BitPath::from_ipv6(*self))
    }
}

impl ToBitPath for IpAddr {
    fn to_bit_path(&self) -> Result<BitPath> {
        Ok(BitPath::from_ip(*self))
    }
}

/// Whether `address` is an IPv4 address in the shared 128-bit space
pub fn is_ipv4<A: ToBitPath + ?Sized>(address: &A) -> Result<bool> {
    Ok(address.to_bit_path()?.is_ipv4())
}
