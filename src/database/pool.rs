//! String pool access

use super::source::ByteSource;
use crate::error::{LocError, Result};

/// Bytes fetched per read while scanning for the terminator
const CHUNK_SIZE: usize = 500;

/// Read the NUL-terminated UTF-8 string at an absolute file offset
pub fn read_string(source: &dyn ByteSource, offset: u64) -> Result<String> {
    let mut data: Vec<u8> = Vec::new();

    let end = loop {
        let chunk = source.read_at(offset + data.len() as u64, CHUNK_SIZE)?;
        if chunk.is_empty() {
            return Err(LocError::TruncatedRecord {
                record: "string",
                expected: data.len() + 1,
                actual: data.len(),
            });
        }
        let scanned = data.len();
        data.extend_from_slice(&chunk);
        if let Some(pos) = chunk.iter().position(|&b| b == 0) {
            break scanned + pos;
        }
    };

    data.truncate(end);
    String::from_utf8(data).map_err(|source| LocError::InvalidStringEncoding { offset, source })
}
