//! Error types for locdb-rs
//!
//! This module defines custom error types using thiserror for better error handling.

use thiserror::Error;

/// Main error type for locdb-rs
#[derive(Error, Debug)]
pub enum LocError {
    /// File does not start with the location database tag
    #[error("Not a location database: bad magic {0:?}")]
    BadMagic(Vec<u8>),

    /// Only version 1 of the format is understood
    #[error("Unsupported database version: {0}")]
    UnsupportedVersion(u8),

    /// A record could not be read in full
    #[error("Truncated {record} record: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Invalid IP address
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// No network in the database covers the address
    #[error(
        "No information could be found for '{0}'. Likely this is a reserved IP?\n\
         more information about reserved ips can be found here: https://en.wikipedia.org/wiki/Reserved_IP_addresses"
    )]
    IpAddressError(String),

    /// The AS table has no entry for this number
    #[error("Cannot find the name for the ASN with id {0}")]
    UnknownAsnName(u32),

    /// Sorted table search exhausted without a match
    #[error("Record not found: {0}")]
    NotFound(String),

    /// String pool entry is not valid UTF-8
    #[error("Invalid string encoding at pool offset {offset}: {source}")]
    InvalidStringEncoding {
        offset: u64,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Database corrupted
    #[error("Database corrupted: {0}")]
    DatabaseCorrupted(String),

    /// Database not found
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Download error
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlError(String),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for locdb-rs
pub type Result<T> = std::result::Result<T, LocError>;

impl LocError {
    /// Create a corruption error
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        LocError::DatabaseCorrupted(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        LocError::ConfigError(msg.into())
    }

    /// Create a network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        LocError::NetworkError(msg.into())
    }

    /// Create a download error
    pub fn download<S: Into<String>>(msg: S) -> Self {
        LocError::DownloadError(msg.into())
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for LocError {
    fn from(err: anyhow::Error) -> Self {
        LocError::Other(err.to_string())
    }
}

/// Convert from TryFromSliceError
impl From<std::array::TryFromSliceError> for LocError {
    fn from(err: std::array::TryFromSliceError) -> Self {
        LocError::DatabaseCorrupted(format!("Failed to convert byte slice: {}", err))
    }
}

/// Convert from IpNetworkError
impl From<ipnetwork::IpNetworkError> for LocError {
    fn from(err: ipnetwork::IpNetworkError) -> Self {
        LocError::InvalidAddress(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            LocError::UnknownAsnName(18734).to_string(),
            "Cannot find the name for the ASN with id 18734"
        );
        assert!(
            LocError::IpAddressError("100.127.255.25".to_string())
                .to_string()
                .starts_with("No information could be found for '100.127.255.25'. Likely this is a reserved IP?")
        );
    }

    #[test]
    fn test_conversions() {
        let err: LocError = "10.0.0.0/33".parse::<ipnetwork::IpNetwork>().unwrap_err().into();
        assert!(matches!(err, LocError::InvalidAddress(_)));

        let short: &[u8] = &[1, 2];
        let err: LocError = <[u8; 4]>::try_from(short).unwrap_err().into();
        assert!(matches!(err, LocError::DatabaseCorrupted(_)));

        let err: LocError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "Other error: boom");
    }
}
