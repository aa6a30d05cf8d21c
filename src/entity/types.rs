//! Owned, serializable snapshots of lookup results

use crate::database::{IpInformation, LocationDatabase, NetworkRecord};
use crate::error::{LocError, Result};
use ipnetwork::IpNetwork;
use serde::Serialize;
use std::net::IpAddr;

/// One resolved address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupSummary {
    pub ip: IpAddr,
    /// Covering network as `address/prefix`
    pub network: String,
    pub country_code: String,
    pub country_name: String,
    pub continent: String,
    pub asn: u32,
    /// `None` when the AS table has no entry for `asn`
    pub asn_name: Option<String>,
    pub is_anonymous_proxy: bool,
    pub is_satellite_provider: bool,
    pub is_anycast: bool,
    pub is_drop: bool,
}

/// `Ok(None)` for an AS name the database does not know, whatever the reader mode
fn optional_asn_name(name: Result<String>) -> Result<Option<String>> {
    match name {
        Ok(name) if name.is_empty() => Ok(None),
        Ok(name) => Ok(Some(name)),
        Err(LocError::UnknownAsnName(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl LookupSummary {
    pub fn from_info(info: &IpInformation<'_>) -> Result<Self> {
        Ok(Self {
            ip: info.ip(),
            network: info.ip_with_cidr()?.to_string(),
            country_code: info.country_code().to_string(),
            country_name: info.country_name()?.to_string(),
            continent: info.country_continent()?.to_string(),
            asn: info.asn(),
            asn_name: optional_asn_name(info.asn_name().map(str::to_string))?,
            is_anonymous_proxy: info.is_anonymous_proxy(),
            is_satellite_provider: info.is_satellite_provider(),
            is_anycast: info.is_anycast(),
            is_drop: info.is_drop(),
        })
    }
}

/// One network of the tree, as written by the CSV export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub network: String,
    pub country_code: String,
    pub asn: u32,
    pub asname: String,
    pub is_anonymous_proxy: bool,
    pub is_satellite_provider: bool,
    pub is_anycast: bool,
    pub is_drop: bool,
}

impl NetworkSummary {
    /// `asname` is empty when the AS table has no entry
    pub fn new(db: &LocationDatabase, network: IpNetwork, record: &NetworkRecord) -> Result<Self> {
        let asname = optional_asn_name(db.as_name(record.asn))?.unwrap_or_default();
        Ok(Self {
            network: network.to_string(),
            country_code: record.country_code(),
            asn: record.asn,
            asname,
            is_anonymous_proxy: record.is_anonymous_proxy(),
            is_satellite_provider: record.is_satellite_provider(),
            is_anycast: record.is_anycast(),
            is_drop: record.is_drop(),
        })
    }
}

/// Header metadata shown by `--info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub vendor: String,
    pub description: String,
    pub license: String,
    pub created_at: String,
    pub countries: usize,
    pub autonomous_systems: usize,
    pub networks: usize,
}

impl DatabaseSummary {
    pub fn new(db: &LocationDatabase) -> Result<Self> {
        Ok(Self {
            vendor: db.vendor()?,
            description: db.description()?,
            license: db.license()?,
            created_at: db.created_at()?.to_rfc3339(),
            countries: db.all_countries()?.count(),
            autonomous_systems: db.all_autonomous_systems()?.count(),
            networks: db.all_network_records()?.count(),
        })
    }
}
