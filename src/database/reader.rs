//! Location database reader
//!
//! [`LocationDatabase`] opens the file on first use, validates the header once and
//! then answers lookups by walking the network trie and searching the sorted
//! tables. Every read goes through a [`ByteSource`], so the same code serves a
//! plain file handle, a memory map or an in-memory buffer.

use super::address::{BitPath, ToBitPath, ADDRESS_BITS};
use super::format::{Record, Section};
use super::header::Header;
use super::info::IpInformation;
use super::pool;
use super::record::{AsRecord, CountryRecord, NetworkRecord, TrieNode};
use super::search::{Table, TableIter};
use super::source::{ByteSource, FileSource, MmapSource, Prepare};
use super::trie::{Leaves, NetworkTree, NodeCache};
use crate::error::{LocError, Result};
use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use once_cell::sync::OnceCell;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// How the database file is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Seek and read through a shared file handle
    #[default]
    Seek,
    /// Map the whole file into memory
    Mmap,
}

/// Reader behaviour switches
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Surface "no covering network" and "unknown ASN name" as errors
    pub raise_on_failure: bool,
    pub access: AccessMode,
    /// Capacity of the trie node cache; 0 disables it
    pub node_cache_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            raise_on_failure: true,
            access: AccessMode::Seek,
            node_cache_size: 5000,
        }
    }
}

/// A read-only view of one location database file
pub struct LocationDatabase {
    path: Option<PathBuf>,
    options: ReaderOptions,
    prepare: Option<Box<dyn Prepare>>,
    /// Outcome of the single prepare run; `Some` holds the failure message
    prepared: OnceCell<Option<String>>,
    source: OnceCell<Box<dyn ByteSource>>,
    header: OnceCell<Header>,
    cache: Option<NodeCache>,
}

impl LocationDatabase {
    /// Reader for the file at `path` with default options; nothing is read yet
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_options(path, ReaderOptions::default())
    }

    pub fn with_options<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Self {
        let cache = NonZeroUsize::new(options.node_cache_size).map(NodeCache::new);
        Self {
            path: Some(path.as_ref().to_path_buf()),
            options,
            prepare: None,
            prepared: OnceCell::new(),
            source: OnceCell::new(),
            header: OnceCell::new(),
            cache,
        }
    }

    /// Reader over an already open byte source
    pub fn from_source(source: Box<dyn ByteSource>, options: ReaderOptions) -> Self {
        let cache = NonZeroUsize::new(options.node_cache_size).map(NodeCache::new);
        Self {
            path: None,
            options,
            prepare: None,
            prepared: OnceCell::new(),
            source: OnceCell::with_value(source),
            header: OnceCell::new(),
            cache,
        }
    }

    /// Run `prepare` once, right before the file is first opened
    pub fn with_prepare(mut self, prepare: Box<dyn Prepare>) -> Self {
        self.prepare = Some(prepare);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn raise_on_failure(&self) -> bool {
        self.options.raise_on_failure
    }

    /// Whether the backing source has been opened
    pub fn is_loaded(&self) -> bool {
        self.source.get().is_some()
    }

    fn source(&self) -> Result<&dyn ByteSource> {
        let source = self.source.get_or_try_init(|| {
            let path = self
                .path
                .as_deref()
                .ok_or_else(|| LocError::DatabaseNotFound("no database path configured".to_string()))?;

            if let Some(prepare) = &self.prepare {
                self.run_prepare(&**prepare, path)?;
            }

            log::info!("Opening location database: {}", path.display());
            let source: Box<dyn ByteSource> = match self.options.access {
                AccessMode::Seek => Box::new(FileSource::open(path)?),
                AccessMode::Mmap => Box::new(MmapSource::open(path)?),
            };
            log::debug!("Database size: {} bytes", source.len());
            Ok::<_, LocError>(source)
        })?;
        Ok(&**source)
    }

    /// Prepare is attempted once; later opens report the first failure again
    fn run_prepare(&self, prepare: &dyn Prepare, path: &Path) -> Result<()> {
        let mut first_error = None;
        let outcome = self.prepared.get_or_init(|| match prepare.prepare(path) {
            Ok(()) => None,
            Err(e) => {
                let message = e.to_string();
                first_error = Some(e);
                Some(message)
            }
        });
        if let Some(e) = first_error {
            return Err(e);
        }
        match outcome {
            Some(message) => Err(LocError::DatabaseNotFound(format!(
                "{} could not be prepared: {}",
                path.display(),
                message
            ))),
            None => Ok(()),
        }
    }

    /// Validated header, read on first access
    pub fn header(&self) -> Result<&Header> {
        self.header.get_or_try_init(|| {
            let header = Header::read_from(self.source()?)?;
            log::debug!(
                "Header: created {}, {} AS bytes, {} network bytes, {} tree bytes, {} country bytes",
                header.created_at,
                header.as_length,
                header.network_data_length,
                header.network_tree_length,
                header.countries_length
            );
            Ok(header)
        })
    }

    fn table<T: Record>(&self, section: Section) -> Result<Table<'_, T>> {
        let (offset, length) = self.header()?.section(section);
        Ok(Table::new(self.source()?, offset, length))
    }

    pub fn tree(&self) -> Result<NetworkTree<'_>> {
        let (offset, length) = self.header()?.section(Section::NetworkTree);
        Ok(NetworkTree::new(self.source()?, offset, length, self.cache.as_ref()))
    }

    /// String at `offset` relative to the start of the pool
    pub fn read_string(&self, offset: u32) -> Result<String> {
        let (pool_offset, _) = self.header()?.section(Section::Pool);
        pool::read_string(self.source()?, pool_offset + offset as u64)
    }

    pub fn vendor(&self) -> Result<String> {
        self.read_string(self.header()?.vendor)
    }

    pub fn description(&self) -> Result<String> {
        self.read_string(self.header()?.description)
    }

    pub fn license(&self) -> Result<String> {
        self.read_string(self.header()?.license)
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        let secs = self.header()?.created_at;
        i64::try_from(secs)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| LocError::corrupted(format!("creation time {} out of range", secs)))
    }

    /// Network data record at `index`
    pub fn network_record(&self, index: u32) -> Result<NetworkRecord> {
        let table = self.table::<NetworkRecord>(Section::NetworkData)?;
        if index as u64 >= table.len() {
            return Err(LocError::corrupted(format!(
                "network index {} out of range ({} records)",
                index,
                table.len()
            )));
        }
        table.get(index as u64)
    }

    /// Most specific network covering `address` and its trie depth
    ///
    /// Always fails with [`LocError::IpAddressError`] when nothing covers the
    /// address, whatever `raise_on_failure` says.
    pub fn find_network<A: ToBitPath + ?Sized>(&self, address: &A) -> Result<(NetworkRecord, u8)> {
        let path = address.to_bit_path()?;
        match self.tree()?.lookup(&path)? {
            Some(found) => Ok((self.network_record(found.network)?, found.prefix_len)),
            None => Err(LocError::IpAddressError(path.to_ip().to_string())),
        }
    }

    /// Everything the database knows about `address`
    pub fn lookup<A: ToBitPath + ?Sized>(&self, address: &A) -> Result<IpInformation<'_>> {
        let path = address.to_bit_path()?;
        match self.find_network(&path) {
            Ok((network, prefix_len)) => Ok(IpInformation::new(self, path, network, prefix_len)),
            Err(LocError::IpAddressError(ip)) if !self.options.raise_on_failure => {
                log::debug!("No network covers {}, returning empty record", ip);
                Ok(IpInformation::new(self, path, NetworkRecord::empty(), ADDRESS_BITS))
            }
            Err(e) => Err(e),
        }
    }

    /// Two-letter country code of the network covering `address`
    pub fn find_country<A: ToBitPath + ?Sized>(&self, address: &A) -> Result<String> {
        Ok(self.lookup(address)?.country_code().to_string())
    }

    /// AS entry for `asn`; a miss is [`LocError::UnknownAsnName`]
    pub fn find_autonomous_system(&self, asn: u32) -> Result<AsRecord> {
        self.table::<AsRecord>(Section::AutonomousSystems)?
            .binary_search_by(|rec| rec.number.cmp(&asn))
            .map_err(|e| match e {
                LocError::NotFound(_) => LocError::UnknownAsnName(asn),
                other => other,
            })
    }

    pub fn as_name(&self, asn: u32) -> Result<String> {
        let record = self.find_autonomous_system(asn)?;
        self.read_string(record.name)
    }

    /// Country entry for a two-letter code
    pub fn find_country_record(&self, code: [u8; 2]) -> Result<CountryRecord> {
        self.table::<CountryRecord>(Section::Countries)?
            .binary_search_by(|rec| rec.code.cmp(&code))
            .map_err(|e| match e {
                LocError::NotFound(_) => LocError::NotFound(format!(
                    "country '{}'",
                    String::from_utf8_lossy(&code)
                )),
                other => other,
            })
    }

    pub fn all_countries(&self) -> Result<TableIter<'_, CountryRecord>> {
        Ok(self.table::<CountryRecord>(Section::Countries)?.iter())
    }

    pub fn all_autonomous_systems(&self) -> Result<TableIter<'_, AsRecord>> {
        Ok(self.table::<AsRecord>(Section::AutonomousSystems)?.iter())
    }

    pub fn all_network_records(&self) -> Result<TableIter<'_, NetworkRecord>> {
        Ok(self.table::<NetworkRecord>(Section::NetworkData)?.iter())
    }

    pub fn all_trie_nodes(&self) -> Result<TableIter<'_, TrieNode>> {
        Ok(self.table::<TrieNode>(Section::NetworkTree)?.iter())
    }

    /// Every network in the tree with its record, in ascending prefix order
    pub fn networks(&self) -> Result<Networks<'_>> {
        Ok(Networks {
            db: self,
            leaves: self.tree()?.leaves(),
        })
    }
}

/// Iterator over `(network, record)` pairs; stops after the first error
pub struct Networks<'a> {
    db: &'a LocationDatabase,
    leaves: Leaves<'a>,
}

impl Networks<'_> {
    fn resolve(&self, item: Result<(BitPath, TrieNode)>) -> Result<(IpNetwork, NetworkRecord)> {
        let (path, node) = item?;
        let network = IpNetwork::new(path.to_ip(), path.family_prefix_len())?;
        Ok((network, self.db.network_record(node.network)?))
    }
}

impl Iterator for Networks<'_> {
    type Item = Result<(IpNetwork, NetworkRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.leaves.next()?;
        Some(self.resolve(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixture::Fixture;
    use crate::database::source::SliceSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn db() -> LocationDatabase {
        Fixture::standard().open(true)
    }

    #[test]
    fn test_header_strings() {
        let db = db();
        assert_eq!(db.vendor().unwrap(), "IPFire Project");
        assert_eq!(db.description().unwrap(), "Test database");
        assert_eq!(db.license().unwrap(), "CC BY-SA 4.0");
        assert_eq!(db.created_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_find_country() {
        let db = db();
        assert_eq!(db.find_country("8.8.8.8").unwrap(), "US");
        assert_eq!(db.find_country("5.39.209.157").unwrap(), "ES");
        assert_eq!(db.find_country("2001:db8:1::1").unwrap(), "FR");
        assert_eq!(db.find_country("2001:db8:2::1").unwrap(), "DE");
    }

    #[test]
    fn test_nested_networks() {
        let db = db();
        let inner = db.lookup("10.1.2.3").unwrap();
        assert_eq!(inner.country_code(), "BE");
        assert_eq!(inner.subnet_mask(), 16);

        let outer = db.lookup("10.2.0.1").unwrap();
        assert_eq!(outer.country_code(), "NL");
        assert_eq!(outer.subnet_mask(), 8);
        assert_eq!(outer.ip_with_cidr().unwrap(), "10.0.0.0/8");
    }

    #[test]
    fn test_uncovered_address_raises() {
        let db = db();
        for ip in ["255.255.255.255", "100.127.255.25"] {
            let err = db.lookup(ip).unwrap_err();
            assert!(matches!(err, LocError::IpAddressError(_)), "{ip}: {err}");
            assert!(err.to_string().contains(ip));
        }
    }

    #[test]
    fn test_uncovered_address_soft() {
        let db = Fixture::standard().open(false);
        let info = db.lookup("255.255.255.255").unwrap();
        assert_eq!(info.country_code(), "");
        assert_eq!(info.asn(), 0);
        assert_eq!(info.subnet_mask(), 32);
        assert_eq!(info.network_address().unwrap().to_string(), "255.255.255.255");
        assert_eq!(info.ip_with_cidr().unwrap(), "255.255.255.255/32");

        // find_network ignores the soft switch
        assert!(matches!(
            db.find_network("255.255.255.255"),
            Err(LocError::IpAddressError(_))
        ));
    }

    #[test]
    fn test_invalid_address_always_raises() {
        let soft = Fixture::standard().open(false);
        assert!(matches!(soft.lookup("not-an-ip"), Err(LocError::InvalidAddress(_))));
    }

    #[test]
    fn test_integer_addresses() {
        let db = db();
        assert_eq!(db.find_country(&134744072u32).unwrap(), "US");
        let v6 = u128::from("2001:db8::1".parse::<std::net::Ipv6Addr>().unwrap());
        assert_eq!(db.find_country(&v6).unwrap(), "DE");
    }

    #[test]
    fn test_as_lookup() {
        let db = db();
        assert_eq!(db.as_name(15169).unwrap(), "GOOGLE");
        assert!(matches!(db.as_name(18734), Err(LocError::UnknownAsnName(18734))));
        assert!(matches!(db.as_name(0), Err(LocError::UnknownAsnName(0))));
    }

    #[test]
    fn test_country_table() {
        let db = db();
        let es = db.find_country_record(*b"ES").unwrap();
        assert_eq!(es.continent_code(), "EU");
        assert_eq!(db.read_string(es.name).unwrap(), "Spain");
        assert!(matches!(db.find_country_record(*b"QQ"), Err(LocError::NotFound(_))));
    }

    #[test]
    fn test_table_enumeration() {
        let db = db();
        let codes: Vec<String> = db.all_countries().unwrap().map(|c| c.unwrap().code()).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
        assert!(codes.contains(&"US".to_string()));

        let systems: Vec<u32> = db
            .all_autonomous_systems()
            .unwrap()
            .map(|a| a.unwrap().number)
            .collect();
        assert!(systems.windows(2).all(|w| w[0] < w[1]));

        let records = db.all_network_records().unwrap().count();
        assert_eq!(records, Fixture::standard().network_count());
        assert!(db.all_trie_nodes().unwrap().count() > records);
    }

    #[test]
    fn test_networks_enumeration() {
        let db = db();
        let nets: Vec<(String, String)> = db
            .networks()
            .unwrap()
            .map(|n| {
                let (net, rec) = n.unwrap();
                (net.to_string(), rec.country_code())
            })
            .collect();

        assert_eq!(nets.len(), Fixture::standard().network_count());
        assert!(nets.contains(&("8.8.8.0/24".to_string(), "US".to_string())));
        assert!(nets.contains(&("2001:db8::/32".to_string(), "DE".to_string())));

        // parents are listed before the networks nested in them
        let outer = nets.iter().position(|(n, _)| n == "10.0.0.0/8").unwrap();
        let inner = nets.iter().position(|(n, _)| n == "10.1.0.0/16").unwrap();
        assert!(outer < inner);
    }

    #[test]
    fn test_short_signature_file() {
        let fixture = Fixture::standard().signature_len(71);
        let db = fixture.open(true);
        assert_eq!(db.header().unwrap().signature1.len(), 71);
        assert_eq!(db.find_country("8.8.8.8").unwrap(), "US");
    }

    #[test]
    fn test_open_file_lazily() {
        let file = Fixture::standard().temp_file();
        for access in [AccessMode::Seek, AccessMode::Mmap] {
            let options = ReaderOptions {
                access,
                ..ReaderOptions::default()
            };
            let db = LocationDatabase::with_options(file.path(), options);
            assert!(!db.is_loaded());
            assert_eq!(db.find_country("9.9.9.9").unwrap(), "CH");
            assert!(db.is_loaded());
        }
    }

    #[test]
    fn test_missing_file() {
        let db = LocationDatabase::new("/nonexistent/location.db");
        assert!(matches!(db.header(), Err(LocError::DatabaseNotFound(_))));
    }

    #[test]
    fn test_garbage_file() {
        let db = LocationDatabase::from_source(
            Box::new(SliceSource::new(b"not a database at all".to_vec())),
            ReaderOptions::default(),
        );
        assert!(matches!(db.lookup("8.8.8.8"), Err(LocError::BadMagic(_))));
    }

    struct CountingPrepare(Arc<AtomicUsize>);

    impl Prepare for CountingPrepare {
        fn prepare(&self, _path: &Path) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_prepare_runs_once() {
        let file = Fixture::standard().temp_file();
        let calls = Arc::new(AtomicUsize::new(0));
        let db = LocationDatabase::new(file.path())
            .with_prepare(Box::new(CountingPrepare(calls.clone())));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        db.find_country("8.8.8.8").unwrap();
        db.find_country("1.1.1.1").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct FailingPrepare(Arc<AtomicUsize>);

    impl Prepare for FailingPrepare {
        fn prepare(&self, _path: &Path) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(LocError::network("server unreachable"))
        }
    }

    #[test]
    fn test_failed_prepare_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let db = LocationDatabase::new(dir.path().join("location.db"))
            .with_prepare(Box::new(FailingPrepare(calls.clone())));

        assert!(matches!(db.find_country("8.8.8.8"), Err(LocError::NetworkError(_))));
        for _ in 0..2 {
            match db.find_country("8.8.8.8") {
                Err(LocError::DatabaseNotFound(msg)) => assert!(msg.contains("server unreachable")),
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!db.is_loaded());
    }

    #[test]
    fn test_shared_across_threads() {
        let db = Arc::new(db());
        let handles: Vec<_> = ["8.8.8.8", "5.39.209.157", "10.1.2.3", "9.9.9.9"]
            .into_iter()
            .map(|ip| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || db.find_country(ip).unwrap())
            })
            .collect();
        let codes: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(codes, vec!["US", "ES", "BE", "CH"]);
    }
    #[test]
    fn test_file_source_shared_across_threads() {
        let file = Fixture::standard().temp_file();
        let options = ReaderOptions {
            access: AccessMode::Seek,
            node_cache_size: 2,
            ..ReaderOptions::default()
        };
        let db = Arc::new(LocationDatabase::with_options(file.path(), options));
        let expected = [
            ("8.8.8.8", "US"),
            ("5.39.209.157", "ES"),
            ("10.1.2.3", "BE"),
            ("10.200.0.1", "NL"),
            ("9.9.9.9", "CH"),
            ("2001:db8:1::1", "FR"),
            ("2001:db8:ffff::1", "DE"),
            ("1.1.1.1", "AU"),
        ];

        let handles: Vec<_> = (0..8)
            .map(|offset| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let (ip, code) = expected[(offset + round) % expected.len()];
                        assert_eq!(db.find_country(ip).unwrap(), code, "{}", ip);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_repeated_lookups_match() {
        let db = db();
        for ip in ["8.8.8.8", "201.148.95.249", "1.2.3.4", "2001:db8:1::1"] {
            let first = db.lookup(ip).unwrap();
            let second = db.lookup(ip).unwrap();
            assert_eq!(first.network_record(), second.network_record(), "{}", ip);
            assert_eq!(first.prefix_len(), second.prefix_len());
            assert_eq!(first.country_code(), second.country_code());
            assert_eq!(first.asn(), second.asn());
            assert_eq!(first.asn_name().ok(), second.asn_name().ok());
            assert_eq!(first.country_name().unwrap(), second.country_name().unwrap());
            assert_eq!(first.country_continent().unwrap(), second.country_continent().unwrap());
            assert_eq!(first.network().unwrap(), second.network().unwrap());
            assert_eq!(first.subnet_mask(), second.subnet_mask());
            assert_eq!(first.is_anonymous_proxy(), second.is_anonymous_proxy());
            assert_eq!(first.is_satellite_provider(), second.is_satellite_provider());
            assert_eq!(first.is_anycast(), second.is_anycast());
            assert_eq!(first.is_drop(), second.is_drop());
        }
    }
}
