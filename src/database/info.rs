//! Lookup result with lazily resolved fields

use super::address::{BitPath, IPV4_PREFIX_LEN};
use super::record::{CountryRecord, NetworkRecord};
use super::reader::LocationDatabase;
use crate::error::{LocError, Result};
use ipnetwork::IpNetwork;
use once_cell::unsync::OnceCell;
use std::fmt;
use std::net::IpAddr;

/// What the database knows about one address
///
/// Values carried by the network record are available immediately. Names and
/// the derived network are resolved on first access and then cached, so
/// repeated calls return the same value without touching the file again.
pub struct IpInformation<'db> {
    db: &'db LocationDatabase,
    path: BitPath,
    network: NetworkRecord,
    prefix_len: u8,
    country_code: String,
    asn_name: OnceCell<Option<String>>,
    country: OnceCell<Option<CountryRecord>>,
    country_name: OnceCell<String>,
    continent: OnceCell<String>,
    cidr: OnceCell<IpNetwork>,
    ip_with_cidr: OnceCell<String>,
}

impl<'db> IpInformation<'db> {
    pub(crate) fn new(db: &'db LocationDatabase, path: BitPath, network: NetworkRecord, prefix_len: u8) -> Self {
        Self {
            db,
            path,
            country_code: network.country_code(),
            network,
            prefix_len,
            asn_name: OnceCell::new(),
            country: OnceCell::new(),
            country_name: OnceCell::new(),
            continent: OnceCell::new(),
            cidr: OnceCell::new(),
            ip_with_cidr: OnceCell::new(),
        }
    }

    /// The queried address
    pub fn ip(&self) -> IpAddr {
        self.path.to_ip()
    }

    pub fn bit_path(&self) -> &BitPath {
        &self.path
    }

    pub fn network_record(&self) -> &NetworkRecord {
        &self.network
    }

    /// Depth of the match in the 128-bit tree
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn asn(&self) -> u32 {
        self.network.asn
    }

    pub fn is_anonymous_proxy(&self) -> bool {
        self.network.is_anonymous_proxy()
    }

    pub fn is_satellite_provider(&self) -> bool {
        self.network.is_satellite_provider()
    }

    pub fn is_anycast(&self) -> bool {
        self.network.is_anycast()
    }

    pub fn is_drop(&self) -> bool {
        self.network.is_drop()
    }

    pub fn is_ipv4(&self) -> bool {
        self.path.is_ipv4()
    }

    /// Name of the autonomous system
    ///
    /// An ASN missing from the AS table is [`LocError::UnknownAsnName`], or an
    /// empty string when the reader does not raise on failure.
    pub fn asn_name(&self) -> Result<&str> {
        let asn = self.network.asn;
        let name = self.asn_name.get_or_try_init(|| match self.db.as_name(asn) {
            Ok(name) => Ok(Some(name)),
            Err(LocError::UnknownAsnName(_)) => Ok(None),
            Err(e) => Err(e),
        })?;

        match name {
            Some(name) => Ok(name),
            None if self.db.raise_on_failure() => Err(LocError::UnknownAsnName(asn)),
            None => Ok(""),
        }
    }

    fn country(&self) -> Result<Option<&CountryRecord>> {
        let country = self.country.get_or_try_init(|| {
            if !self.network.has_country() {
                return Ok(None);
            }
            self.db.find_country_record(self.network.country_code).map(Some)
        })?;
        Ok(country.as_ref())
    }

    /// Full country name; empty when the network carries no country
    pub fn country_name(&self) -> Result<&str> {
        self.country_name
            .get_or_try_init(|| match self.country()? {
                Some(country) => self.db.read_string(country.name),
                None => Ok(String::new()),
            })
            .map(String::as_str)
    }

    /// Two-letter continent code of the country
    pub fn country_continent(&self) -> Result<&str> {
        self.continent
            .get_or_try_init(|| Ok::<_, LocError>(self.country()?.map(|c| c.continent_code()).unwrap_or_default()))
            .map(String::as_str)
    }

    /// Prefix length in the address's own family
    pub fn subnet_mask(&self) -> u8 {
        if self.is_ipv4() {
            self.prefix_len.saturating_sub(IPV4_PREFIX_LEN)
        } else {
            self.prefix_len
        }
    }

    /// The matched network with host bits cleared
    pub fn network(&self) -> Result<IpNetwork> {
        self.cidr
            .get_or_try_init(|| {
                let net = IpNetwork::new(self.ip(), self.subnet_mask())?;
                Ok::<_, LocError>(IpNetwork::new(net.network(), net.prefix())?)
            })
            .copied()
    }

    pub fn network_address(&self) -> Result<IpAddr> {
        Ok(self.network()?.network())
    }

    /// Network address and mask as `address/prefix`
    pub fn ip_with_cidr(&self) -> Result<&str> {
        self.ip_with_cidr
            .get_or_try_init(|| Ok::<_, LocError>(format!("{}/{}", self.network_address()?, self.subnet_mask())))
            .map(String::as_str)
    }
}

impl fmt::Debug for IpInformation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpInformation")
            .field("ip", &self.ip())
            .field("prefix_len", &self.prefix_len)
            .field("network", &self.network)
            .finish()
    }
}
