//! Location database header structure

use super::format::{
    ensure_len, layout_size, Field, FieldKind, FieldReader, FieldWriter, Record, RecordKind,
    Section, HEADER_PADDING, MAGIC, SIGNATURE_MAX_LENGTH, VERSION,
};
use super::record::Magic;
use super::source::ByteSource;
use crate::error::{LocError, Result};

/// Fields preceding the signature blobs
const HEADER_FIELDS: &[Field] = &[
    Field::new("created_at", FieldKind::U64),
    Field::new("vendor", FieldKind::U32),
    Field::new("description", FieldKind::U32),
    Field::new("license", FieldKind::U32),
    Field::new("as_offset", FieldKind::U32),
    Field::new("as_length", FieldKind::U32),
    Field::new("network_data_offset", FieldKind::U32),
    Field::new("network_data_length", FieldKind::U32),
    Field::new("network_tree_offset", FieldKind::U32),
    Field::new("network_tree_length", FieldKind::U32),
    Field::new("countries_offset", FieldKind::U32),
    Field::new("countries_length", FieldKind::U32),
    Field::new("pool_offset", FieldKind::U32),
    Field::new("pool_length", FieldKind::U32),
    Field::new("signature1_length", FieldKind::U16),
    Field::new("signature2_length", FieldKind::U16),
    Field::new("signature1", FieldKind::Bytes(SIGNATURE_MAX_LENGTH)),
    Field::new("signature2", FieldKind::Bytes(SIGNATURE_MAX_LENGTH)),
    Field::new("padding", FieldKind::Bytes(HEADER_PADDING)),
];

/// Number of leading fields with a fixed position
const FIXED_FIELD_COUNT: usize = 16;

/// Location database header (format version 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// UNIX timestamp when the database was created
    pub created_at: u64,
    pub vendor: u32,
    pub description: u32,
    pub license: u32,
    pub as_offset: u32,
    pub as_length: u32,
    pub network_data_offset: u32,
    pub network_data_length: u32,
    pub network_tree_offset: u32,
    pub network_tree_length: u32,
    pub countries_offset: u32,
    pub countries_length: u32,
    pub pool_offset: u32,
    pub pool_length: u32,
    pub signature1: Vec<u8>,
    pub signature2: Vec<u8>,
}

impl Header {
    /// Size of the fields before the signatures
    pub const PREFIX_SIZE: usize = {
        let (fixed, _) = HEADER_FIELDS.split_at(FIXED_FIELD_COUNT);
        layout_size(fixed)
    };

    /// Whether both signatures use the full fixed-size slots
    fn is_fixed_layout(sig1_len: usize, sig2_len: usize) -> bool {
        sig1_len == SIGNATURE_MAX_LENGTH && sig2_len == SIGNATURE_MAX_LENGTH
    }

    /// Bytes following the prefix for the given signature lengths
    pub fn tail_size(sig1_len: usize, sig2_len: usize) -> usize {
        if Self::is_fixed_layout(sig1_len, sig2_len) {
            Self::SIZE - Self::PREFIX_SIZE
        } else {
            sig1_len + sig2_len + HEADER_PADDING
        }
    }

    /// Signature lengths declared in a prefix buffer
    fn signature_lengths(prefix: &[u8]) -> Result<(usize, usize)> {
        ensure_len(Self::KIND, prefix, Self::PREFIX_SIZE)?;
        let at = Self::PREFIX_SIZE - 4;
        let mut r = FieldReader::new(&prefix[at..]);
        let sig1 = r.u16()? as usize;
        let sig2 = r.u16()? as usize;
        if sig1 > SIGNATURE_MAX_LENGTH || sig2 > SIGNATURE_MAX_LENGTH {
            return Err(LocError::corrupted(format!(
                "signature lengths {}/{} exceed {}",
                sig1, sig2, SIGNATURE_MAX_LENGTH
            )));
        }
        Ok((sig1, sig2))
    }

    /// Offset and length of a section
    pub fn section(&self, section: Section) -> (u64, u64) {
        let (offset, length) = match section {
            Section::AutonomousSystems => (self.as_offset, self.as_length),
            Section::NetworkData => (self.network_data_offset, self.network_data_length),
            Section::NetworkTree => (self.network_tree_offset, self.network_tree_length),
            Section::Countries => (self.countries_offset, self.countries_length),
            Section::Pool => (self.pool_offset, self.pool_length),
        };
        (offset as u64, length as u64)
    }

    /// Read and validate magic and header from the start of a source
    pub fn read_from(source: &dyn ByteSource) -> Result<Self> {
        let magic = Magic::decode(&source.read_at(0, Magic::SIZE)?)?;
        if &magic.magic != MAGIC {
            return Err(LocError::BadMagic(magic.magic.to_vec()));
        }
        if magic.version != VERSION {
            return Err(LocError::UnsupportedVersion(magic.version));
        }

        let start = Magic::SIZE as u64;
        let mut buf = source.read_at(start, Self::PREFIX_SIZE)?;
        let (sig1, sig2) = Self::signature_lengths(&buf)?;
        if !Self::is_fixed_layout(sig1, sig2) {
            log::debug!("Header uses short signatures ({} / {} bytes)", sig1, sig2);
        }

        let tail = source.read_at(start + Self::PREFIX_SIZE as u64, Self::tail_size(sig1, sig2))?;
        buf.extend_from_slice(&tail);
        Self::decode(&buf)
    }
}

impl Record for Header {
    const KIND: RecordKind = RecordKind::Header;
    const FIELDS: &'static [Field] = HEADER_FIELDS;

    /// Decodes either the fixed layout or the packed short-signature layout
    fn decode(buf: &[u8]) -> Result<Self> {
        let (sig1_len, sig2_len) = Self::signature_lengths(buf)?;
        ensure_len(Self::KIND, buf, Self::PREFIX_SIZE + Self::tail_size(sig1_len, sig2_len))?;

        let mut r = FieldReader::new(buf);
        let created_at = r.u64()?;
        let vendor = r.u32()?;
        let description = r.u32()?;
        let license = r.u32()?;
        let as_offset = r.u32()?;
        let as_length = r.u32()?;
        let network_data_offset = r.u32()?;
        let network_data_length = r.u32()?;
        let network_tree_offset = r.u32()?;
        let network_tree_length = r.u32()?;
        let countries_offset = r.u32()?;
        let countries_length = r.u32()?;
        let pool_offset = r.u32()?;
        let pool_length = r.u32()?;
        r.skip(4)?;

        let (signature1, signature2) = if Self::is_fixed_layout(sig1_len, sig2_len) {
            (r.bytes(SIGNATURE_MAX_LENGTH)?, r.bytes(SIGNATURE_MAX_LENGTH)?)
        } else {
            (r.bytes(sig1_len)?, r.bytes(sig2_len)?)
        };
        r.skip(HEADER_PADDING)?;

        Ok(Self {
            created_at,
            vendor,
            description,
            license,
            as_offset,
            as_length,
            network_data_offset,
            network_data_length,
            network_tree_offset,
            network_tree_length,
            countries_offset,
            countries_length,
            pool_offset,
            pool_length,
            signature1,
            signature2,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let (sig1, sig2) = (self.signature1.len(), self.signature2.len());
        let w = FieldWriter::with_capacity(Self::PREFIX_SIZE + Self::tail_size(sig1, sig2))
            .u64(self.created_at)
            .u32(self.vendor)
            .u32(self.description)
            .u32(self.license)
            .u32(self.as_offset)
            .u32(self.as_length)
            .u32(self.network_data_offset)
            .u32(self.network_data_length)
            .u32(self.network_tree_offset)
            .u32(self.network_tree_length)
            .u32(self.countries_offset)
            .u32(self.countries_length)
            .u32(self.pool_offset)
            .u32(self.pool_length)
            .u16(sig1 as u16)
            .u16(sig2 as u16);

        w.bytes(&self.signature1, sig1)
            .bytes(&self.signature2, sig2)
            .bytes(&[], HEADER_PADDING)
            .finish()
    }
}
