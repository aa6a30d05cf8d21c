//! Location database record structures

use super::format::{
    ensure_len, trim_nul, Field, FieldKind, FieldReader, FieldWriter, Record, RecordKind,
    FLAG_ANONYMOUS_PROXY, FLAG_ANYCAST, FLAG_DROP, FLAG_SATELLITE_PROVIDER, NODE_NO_NETWORK,
};
use crate::error::Result;

/// File preamble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Magic {
    pub magic: [u8; 7],
    pub version: u8,
}

impl Record for Magic {
    const KIND: RecordKind = RecordKind::Magic;
    const FIELDS: &'static [Field] = &[
        Field::new("magic", FieldKind::Bytes(7)),
        Field::new("version", FieldKind::U8),
    ];

    fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(Self::KIND, buf, Self::SIZE)?;
        let mut r = FieldReader::new(buf);
        Ok(Self {
            magic: r.array()?,
            version: r.u8()?,
        })
    }

    fn encode(&self) -> Vec<u8> {
        FieldWriter::with_capacity(Self::SIZE)
            .bytes(&self.magic, 7)
            .u8(self.version)
            .finish()
    }
}

/// Binary trie node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieNode {
    /// Child index for a `0` bit, `0` when absent
    pub zero: u32,
    /// Child index for a `1` bit, `0` when absent
    pub one: u32,
    /// Index into the network data table, or [`NODE_NO_NETWORK`]
    pub network: u32,
}

impl TrieNode {
    /// A node carrying network data
    pub fn is_leaf(&self) -> bool {
        self.network != NODE_NO_NETWORK
    }

    pub fn child(&self, bit: bool) -> u32 {
        if bit { self.one } else { self.zero }
    }
}

impl Record for TrieNode {
    const KIND: RecordKind = RecordKind::TrieNode;
    const FIELDS: &'static [Field] = &[
        Field::new("zero", FieldKind::U32),
        Field::new("one", FieldKind::U32),
        Field::new("network", FieldKind::U32),
    ];

    fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(Self::KIND, buf, Self::SIZE)?;
        let mut r = FieldReader::new(buf);
        Ok(Self {
            zero: r.u32()?,
            one: r.u32()?,
            network: r.u32()?,
        })
    }

    fn encode(&self) -> Vec<u8> {
        FieldWriter::with_capacity(Self::SIZE)
            .u32(self.zero)
            .u32(self.one)
            .u32(self.network)
            .finish()
    }
}

/// Network data attached to a trie leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkRecord {
    pub country_code: [u8; 2],
    pub reserved: [u8; 2],
    pub asn: u32,
    pub flags: u16,
    pub padding: [u8; 2],
}

impl NetworkRecord {
    /// Sentinel used for failed lookups in soft mode
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(country_code: &str, asn: u32, flags: u16) -> Self {
        let mut code = [0u8; 2];
        for (dst, src) in code.iter_mut().zip(country_code.bytes()) {
            *dst = src;
        }
        Self {
            country_code: code,
            asn,
            flags,
            ..Self::default()
        }
    }

    pub fn country_code(&self) -> String {
        trim_nul(&self.country_code)
    }

    pub fn has_country(&self) -> bool {
        self.country_code[0] != 0
    }

    pub fn is_anonymous_proxy(&self) -> bool {
        self.flags & FLAG_ANONYMOUS_PROXY != 0
    }

    pub fn is_satellite_provider(&self) -> bool {
        self.flags & FLAG_SATELLITE_PROVIDER != 0
    }

    pub fn is_anycast(&self) -> bool {
        self.flags & FLAG_ANYCAST != 0
    }

    pub fn is_drop(&self) -> bool {
        self.flags & FLAG_DROP != 0
    }
}

impl Record for NetworkRecord {
    const KIND: RecordKind = RecordKind::Network;
    const FIELDS: &'static [Field] = &[
        Field::new("country_code", FieldKind::Bytes(2)),
        Field::new("reserved", FieldKind::Bytes(2)),
        Field::new("asn", FieldKind::U32),
        Field::new("flags", FieldKind::U16),
        Field::new("padding", FieldKind::Bytes(2)),
    ];

    fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(Self::KIND, buf, Self::SIZE)?;
        let mut r = FieldReader::new(buf);
        Ok(Self {
            country_code: r.array()?,
            reserved: r.array()?,
            asn: r.u32()?,
            flags: r.u16()?,
            padding: r.array()?,
        })
    }

    fn encode(&self) -> Vec<u8> {
        FieldWriter::with_capacity(Self::SIZE)
            .bytes(&self.country_code, 2)
            .bytes(&self.reserved, 2)
            .u32(self.asn)
            .u16(self.flags)
            .bytes(&self.padding, 2)
            .finish()
    }
}

/// Autonomous system entry, sorted by `number`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsRecord {
    pub number: u32,
    /// String pool offset of the AS name
    pub name: u32,
}

impl Record for AsRecord {
    const KIND: RecordKind = RecordKind::AutonomousSystem;
    const FIELDS: &'static [Field] = &[
        Field::new("number", FieldKind::U32),
        Field::new("name", FieldKind::U32),
    ];

    fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(Self::KIND, buf, Self::SIZE)?;
        let mut r = FieldReader::new(buf);
        Ok(Self {
            number: r.u32()?,
            name: r.u32()?,
        })
    }

    fn encode(&self) -> Vec<u8> {
        FieldWriter::with_capacity(Self::SIZE)
            .u32(self.number)
            .u32(self.name)
            .finish()
    }
}

/// Country entry, sorted by `code`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryRecord {
    pub code: [u8; 2],
    pub continent_code: [u8; 2],
    /// String pool offset of the country name
    pub name: u32,
}

impl CountryRecord {
    pub fn code(&self) -> String {
        trim_nul(&self.code)
    }

    pub fn continent_code(&self) -> String {
        trim_nul(&self.continent_code)
    }
}

impl Record for CountryRecord {
    const KIND: RecordKind = RecordKind::Country;
    const FIELDS: &'static [Field] = &[
        Field::new("code", FieldKind::Bytes(2)),
        Field::new("continent_code", FieldKind::Bytes(2)),
        Field::new("name", FieldKind::U32),
    ];

    fn decode(buf: &[u8]) -> Result<Self> {
        ensure_len(Self::KIND, buf, Self::SIZE)?;
        let mut r = FieldReader::new(buf);
        Ok(Self {
            code: r.array()?,
            continent_code: r.array()?,
            name: r.u32()?,
        })
    }

    fn encode(&self) -> Vec<u8> {
        FieldWriter::with_capacity(Self::SIZE)
            .bytes(&self.code, 2)
            .bytes(&self.continent_code, 2)
            .u32(self.name)
            .finish()
    }
}
