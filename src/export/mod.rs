//! CSV dump of every network in the database

use crate::database::LocationDatabase;
use crate::entity::NetworkSummary;
use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write one row per network to `writer`; returns the number of rows
///
/// Columns: `network,country_code,asn,asname,is_anonymous_proxy,
/// is_satellite_provider,is_anycast,is_drop`. Networks come in ascending
/// prefix order with parents before the networks nested in them.
pub fn export_csv<W: Write>(db: &LocationDatabase, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for item in db.networks()? {
        let (network, record) = item?;
        csv.serialize(NetworkSummary::new(db, network, &record)?)?;
        rows += 1;
    }
    csv.flush()?;

    log::info!("Exported {} networks", rows);
    Ok(rows)
}

/// [`export_csv`] into a new file at `path`
pub fn export_csv_file(db: &LocationDatabase, path: &Path) -> Result<usize> {
    export_csv(db, File::create(path)?)
}
