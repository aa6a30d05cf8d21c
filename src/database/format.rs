//! Fixed-layout, big-endian record codec
//!
//! Every on-disk structure is described by a static field list. The byte size of a
//! record is derived from that list at compile time, and decoding walks the same list
//! with a [`FieldReader`] over one buffer of exactly that size.

use crate::error::{LocError, Result};

/// File tag at offset 0
pub const MAGIC: &[u8; 7] = b"LOCDBXX";
/// The only supported format version
pub const VERSION: u8 = 1;

/// Size of each signature slot in the fixed header layout
pub const SIGNATURE_MAX_LENGTH: usize = 2048;
/// Reserved bytes trailing the header
pub const HEADER_PADDING: usize = 32;

/// Trie node `network` value marking an internal node
pub const NODE_NO_NETWORK: u32 = 0xFFFF_FFFF;

pub const FLAG_ANONYMOUS_PROXY: u16 = 1 << 0; // A1
pub const FLAG_SATELLITE_PROVIDER: u16 = 1 << 1; // A2
pub const FLAG_ANYCAST: u16 = 1 << 2; // A3
pub const FLAG_DROP: u16 = 1 << 3; // XD

/// Width and interpretation of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    /// Verbatim byte run
    Bytes(usize),
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 => 8,
            FieldKind::Bytes(n) => n,
        }
    }
}

/// One named field of a record layout
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Total packed size of a field list
pub const fn layout_size(fields: &[Field]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].kind.width();
        i += 1;
    }
    total
}

/// Which table a record comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Magic,
    Header,
    TrieNode,
    Network,
    AutonomousSystem,
    Country,
}

impl RecordKind {
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Magic => "magic",
            RecordKind::Header => "header",
            RecordKind::TrieNode => "trie node",
            RecordKind::Network => "network",
            RecordKind::AutonomousSystem => "autonomous system",
            RecordKind::Country => "country",
        }
    }
}

/// Sections addressed by the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    AutonomousSystems,
    NetworkData,
    NetworkTree,
    Countries,
    Pool,
}

/// A fixed-width on-disk record
pub trait Record: Sized {
    const KIND: RecordKind;
    const FIELDS: &'static [Field];
    const SIZE: usize = layout_size(Self::FIELDS);

    /// Decode from a buffer holding at least `SIZE` bytes
    fn decode(buf: &[u8]) -> Result<Self>;

    /// Encode into exactly `SIZE` bytes
    fn encode(&self) -> Vec<u8>;
}

/// Fail with `TruncatedRecord` unless `buf` holds `expected` bytes
pub fn ensure_len(kind: RecordKind, buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() < expected {
        return Err(LocError::TruncatedRecord {
            record: kind.name(),
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Sequential big-endian reader over a record buffer
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let slice = self.buf.get(self.pos..end).ok_or_else(|| {
            LocError::corrupted(format!("field read past end of record at byte {}", self.pos))
        })?;
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into()?))
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        Ok(self.take(N)?.try_into()?)
    }

    pub fn bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }
}

/// Sequential big-endian writer, the inverse of [`FieldReader`]
#[derive(Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn with_capacity(n: usize) -> Self {
        Self { buf: Vec::with_capacity(n) }
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Write `data` into a slot of `width` bytes, zero-filling the rest
    pub fn bytes(mut self, data: &[u8], width: usize) -> Self {
        let n = data.len().min(width);
        self.buf.extend_from_slice(&data[..n]);
        self.buf.resize(self.buf.len() + (width - n), 0);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Text up to the first NUL of a fixed code field
pub fn trim_nul(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
