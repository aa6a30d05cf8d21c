//! Builder for small in-memory databases used by the tests

use super::address::{BitPath, IPV4_PREFIX_LEN};
use super::format::{Record, MAGIC, NODE_NO_NETWORK, SIGNATURE_MAX_LENGTH, VERSION};
use super::format::{FLAG_ANONYMOUS_PROXY, FLAG_ANYCAST, FLAG_DROP, FLAG_SATELLITE_PROVIDER};
use super::header::Header;
use super::reader::{LocationDatabase, ReaderOptions};
use super::record::{AsRecord, CountryRecord, Magic, NetworkRecord, TrieNode};
use super::source::SliceSource;
use ipnetwork::IpNetwork;
use std::io::Write;

#[derive(Debug, Clone)]
pub struct Fixture {
    networks: Vec<(BitPath, NetworkRecord)>,
    systems: Vec<(u32, String)>,
    countries: Vec<(String, String, String)>,
    signature_len: usize,
}

/// String pool under construction; offsets are relative to its start
struct Pool {
    data: Vec<u8>,
}

impl Pool {
    fn new() -> Self {
        // offset 0 is the empty string
        Self { data: vec![0] }
    }

    fn add(&mut self, s: &str) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        offset
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            networks: Vec::new(),
            systems: Vec::new(),
            countries: Vec::new(),
            signature_len: SIGNATURE_MAX_LENGTH,
        }
    }

    /// Networks, systems and countries covering the common lookup cases
    pub fn standard() -> Self {
        Self::new()
            .network("8.8.8.0/24", "US", 15169, 0)
            .network("1.1.1.0/24", "AU", 13335, 0)
            .network("5.39.208.0/22", "ES", 198871, 0)
            .network("201.148.64.0/19", "MX", 18734, 0)
            .network("202.0.0.0/7", "AU", 0, 0)
            .network("10.0.0.0/8", "NL", 1136, 0)
            .network("10.1.0.0/16", "BE", 5432, 0)
            .network("9.9.9.9/32", "CH", 19281, FLAG_ANYCAST)
            .network(
                "1.2.3.0/24",
                "AP",
                64496,
                FLAG_ANONYMOUS_PROXY | FLAG_SATELLITE_PROVIDER | FLAG_ANYCAST | FLAG_DROP,
            )
            .network("2001:db8::/32", "DE", 3320, 0)
            .network("2001:db8:1::/48", "FR", 3215, 0)
            .autonomous_system(15169, "GOOGLE")
            .autonomous_system(13335, "CLOUDFLARENET")
            .autonomous_system(198871, "Telefonica de Espana")
            .autonomous_system(1136, "KPN B.V.")
            .autonomous_system(5432, "Proximus NV")
            .autonomous_system(19281, "QUAD9-AS-1")
            .autonomous_system(64496, "Example Proxy")
            .autonomous_system(3320, "Deutsche Telekom AG")
            .autonomous_system(3215, "Orange S.A.")
            .country("AP", "AS", "Asia/Pacific Region")
            .country("AU", "OC", "Australia")
            .country("BE", "EU", "Belgium")
            .country("CH", "EU", "Switzerland")
            .country("DE", "EU", "Germany")
            .country("ES", "EU", "Spain")
            .country("FR", "EU", "France")
            .country("MX", "NA", "Mexico")
            .country("NL", "EU", "Netherlands")
            .country("US", "NA", "United States of America")
    }

    pub fn network(mut self, cidr: &str, country: &str, asn: u32, flags: u16) -> Self {
        let net: IpNetwork = cidr.parse().unwrap();
        let mut path = BitPath::from_ip(net.network());
        let len = if net.is_ipv4() {
            IPV4_PREFIX_LEN + net.prefix()
        } else {
            net.prefix()
        };
        path.truncate(len);
        self.networks.push((path, NetworkRecord::new(country, asn, flags)));
        self
    }

    pub fn autonomous_system(mut self, number: u32, name: &str) -> Self {
        self.systems.push((number, name.to_string()));
        self
    }

    pub fn country(mut self, code: &str, continent: &str, name: &str) -> Self {
        self.countries
            .push((code.to_string(), continent.to_string(), name.to_string()));
        self
    }

    pub fn signature_len(mut self, len: usize) -> Self {
        self.signature_len = len;
        self
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    fn trie(&self) -> Vec<TrieNode> {
        let empty = TrieNode {
            zero: 0,
            one: 0,
            network: NODE_NO_NETWORK,
        };
        let mut nodes = vec![empty];

        for (index, (path, _)) in self.networks.iter().enumerate() {
            let mut current = 0usize;
            for bit in path.bits() {
                let child = nodes[current].child(bit) as usize;
                current = if child > 0 {
                    child
                } else {
                    nodes.push(empty);
                    let created = nodes.len() - 1;
                    if bit {
                        nodes[current].one = created as u32;
                    } else {
                        nodes[current].zero = created as u32;
                    }
                    created
                };
            }
            nodes[current].network = index as u32;
        }
        nodes
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::new();
        let vendor = pool.add("IPFire Project");
        let description = pool.add("Test database");
        let license = pool.add("CC BY-SA 4.0");

        let mut systems = self.systems.clone();
        systems.sort_by_key(|(number, _)| *number);
        let systems: Vec<u8> = systems
            .iter()
            .flat_map(|(number, name)| {
                AsRecord {
                    number: *number,
                    name: pool.add(name),
                }
                .encode()
            })
            .collect();

        let mut countries = self.countries.clone();
        countries.sort();
        let countries: Vec<u8> = countries
            .iter()
            .flat_map(|(code, continent, name)| {
                CountryRecord {
                    code: code.as_bytes().try_into().unwrap(),
                    continent_code: continent.as_bytes().try_into().unwrap(),
                    name: pool.add(name),
                }
                .encode()
            })
            .collect();

        let networks: Vec<u8> = self.networks.iter().flat_map(|(_, rec)| rec.encode()).collect();
        let tree: Vec<u8> = self.trie().iter().flat_map(|n| n.encode()).collect();

        let header_len = Header::PREFIX_SIZE + Header::tail_size(self.signature_len, self.signature_len);
        let mut offset = (Magic::SIZE + header_len) as u32;
        let mut place = |section: &[u8]| {
            let at = offset;
            offset += section.len() as u32;
            (at, section.len() as u32)
        };
        let (as_offset, as_length) = place(&systems);
        let (network_data_offset, network_data_length) = place(&networks);
        let (network_tree_offset, network_tree_length) = place(&tree);
        let (countries_offset, countries_length) = place(&countries);
        let (pool_offset, pool_length) = place(&pool.data);

        let header = Header {
            created_at: 1_700_000_000,
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
            signature1: vec![0x5A; self.signature_len],
            signature2: vec![0xA5; self.signature_len],
        };

        let mut data = Magic {
            magic: *MAGIC,
            version: VERSION,
        }
        .encode();
        data.extend(header.encode());
        for section in [&systems, &networks, &tree, &countries, &pool.data] {
            data.extend_from_slice(section);
        }
        data
    }

    pub fn open(&self, raise_on_failure: bool) -> LocationDatabase {
        let options = ReaderOptions {
            raise_on_failure,
            ..ReaderOptions::default()
        };
        LocationDatabase::from_source(Box::new(SliceSource::new(self.build())), options)
    }

    pub fn temp_file(&self) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&self.build()).unwrap();
        file.flush().unwrap();
        file
    }
}
