//! locdb-rs: offline reader for IPFire location databases
//!
//! Answers which country, autonomous system and network an IPv4 or IPv6 address
//! belongs to, straight from a local copy of the `location.db` file.
//!
//! ```no_run
//! use locdb_rs::LocationDatabase;
//!
//! let db = LocationDatabase::new("/var/lib/location/database.db");
//! let info = db.lookup("8.8.8.8")?;
//! println!("{} {} AS{}", info.ip_with_cidr()?, info.country_code(), info.asn());
//! # Ok::<(), locdb_rs::LocError>(())
//! ```

pub mod cli;
pub mod config;
pub mod database;
pub mod download;
pub mod entity;
pub mod error;
pub mod export;
pub mod utils;

pub use config::AppConfig;
pub use database::{
    is_ipv4, AccessMode, BitPath, IpInformation, LocationDatabase, Prepare, ReaderOptions, ToBitPath,
};
pub use download::{Downloader, Refresher};
pub use entity::LookupSummary;
pub use error::{LocError, Result};
