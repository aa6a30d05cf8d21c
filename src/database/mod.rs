//! Location database reader
//!
//! # Module Organization
//!
//! - `format`: field layouts and the big-endian record codec
//! - `record`, `header`: the on-disk structures
//! - `source`: random-access byte sources (file handle, memory map, buffer)
//! - `address`: address normalization into 128-bit trie paths
//! - `trie`, `search`, `pool`: network tree walk, sorted table search, string pool
//! - `reader`, `info`: the database handle and its lookup results

pub mod address;
pub mod format;
pub mod header;
pub mod info;
pub mod pool;
pub mod reader;
pub mod record;
pub mod search;
pub mod source;
pub mod trie;

#[cfg(test)]
pub(crate) mod fixture;

pub use address::{is_ipv4, BitPath, ToBitPath};
pub use header::Header;
pub use info::IpInformation;
pub use reader::{AccessMode, LocationDatabase, Networks, ReaderOptions};
pub use record::{AsRecord, CountryRecord, NetworkRecord, TrieNode};
pub use source::{ByteSource, FileSource, MmapSource, Prepare, SliceSource};
