//! Database downloader module
//!
//! Keeps the local database file current. A file younger than the freshness window
//! is used as is; otherwise the server is asked whether it has something newer and,
//! if so, the compressed database is streamed to disk, unpacked and moved into place.

pub mod decompress;

use crate::config::AppConfig;
use crate::database::Prepare;
use crate::error::{LocError, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{CONTENT_LENGTH, LAST_MODIFIED};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// What the server says about the published file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInfo {
    pub last_modified: Option<SystemTime>,
    pub content_length: Option<u64>,
}

/// Modification time and size of the local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInfo {
    pub modified: SystemTime,
    pub len: u64,
}

impl LocalInfo {
    /// `None` when the file does not exist
    pub fn read(path: &Path) -> Result<Option<Self>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(Self {
                modified: meta.modified()?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether the local file is recent enough to skip the server entirely
pub fn is_fresh(local: Option<&LocalInfo>, freshness: Duration, now: SystemTime) -> bool {
    match local {
        // a modification time in the future counts as fresh
        Some(local) => now
            .duration_since(local.modified)
            .map(|age| age < freshness)
            .unwrap_or(true),
        None => false,
    }
}

/// Whether the published file should replace the local one
///
/// `Last-Modified` decides when present, then `Content-Length`; with neither the
/// file is always fetched.
pub fn needs_download(local: Option<&LocalInfo>, remote: &RemoteInfo) -> bool {
    let Some(local) = local else {
        return true;
    };
    if let Some(remote_modified) = remote.last_modified {
        return local.modified < remote_modified;
    }
    if let Some(len) = remote.content_length {
        return local.len != len;
    }
    true
}

/// Parse an HTTP date such as `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

fn remote_info(headers: &reqwest::header::HeaderMap) -> RemoteInfo {
    RemoteInfo {
        last_modified: headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date),
        content_length: headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok()),
    }
}

/// Sibling of `path` with `suffix` appended to the file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Database downloader
pub struct Downloader {
    client: reqwest::Client,
    url: String,
    freshness: Duration,
    show_progress: bool,
}

impl Downloader {
    pub fn new(url: &str, freshness: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("locdb-rs/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LocError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            freshness,
            show_progress: false,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(&config.database.url, config.freshness())?
            .with_progress(atty::is(atty::Stream::Stderr)))
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bring `path` up to date; returns whether a new file was written
    pub async fn refresh(&self, path: &Path) -> Result<bool> {
        let local = LocalInfo::read(path)?;
        if is_fresh(local.as_ref(), self.freshness, SystemTime::now()) {
            log::debug!("{} is younger than {:?}, not checking for updates", path.display(), self.freshness);
            return Ok(false);
        }

        let remote = self.head().await?;
        if !needs_download(local.as_ref(), &remote) {
            log::info!("{} is up to date", path.display());
            return Ok(false);
        }

        self.download(path).await?;
        Ok(true)
    }

    /// Ask the server about the published file
    pub async fn head(&self) -> Result<RemoteInfo> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .map_err(|e| LocError::network(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(LocError::download(format!("HTTP error: {} - {}", response.status(), self.url)));
        }

        let info = remote_info(response.headers());
        log::debug!("Remote database: {:?}", info);
        Ok(info)
    }

    /// Fetch the database into `path` unconditionally
    pub async fn download(&self, path: &Path) -> Result<()> {
        log::info!("Downloading from: {}", self.url);
        log::info!("Saving to: {}", path.display());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LocError::network(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(LocError::download(format!("HTTP error: {} - {}", response.status(), self.url)));
        }

        let last_modified = remote_info(response.headers()).last_modified;
        let raw = sibling(path, ".download");
        let result = self.stream_to(response, &raw).await.and_then(|_| install(&raw, path, last_modified));
        discard(&raw);
        result?;

        log::info!("Successfully downloaded to: {}", path.display());
        Ok(())
    }

    async fn stream_to(&self, response: reqwest::Response, dest: &Path) -> Result<()> {
        let pb = match response.content_length() {
            Some(total) if self.show_progress => {
                let pb = ProgressBar::new(total);
                let style = ProgressStyle::default_bar()
                    .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .map(|s| s.progress_chars("#>-"))
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                pb.set_style(style);
                pb.set_message(format!("Downloading {}", self.url.rsplit('/').next().unwrap_or("database")));
                Some(pb)
            }
            _ => None,
        };

        let mut file = File::create(dest)?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LocError::network(format!("Failed to read chunk: {}", e)))?;
            file.write_all(&chunk)?;

            downloaded += chunk.len() as u64;
            if let Some(ref pb) = pb {
                pb.set_position(downloaded);
            }
        }
        file.flush()?;

        if let Some(pb) = pb {
            pb.finish_with_message("Downloaded");
        }
        log::debug!("Received {} bytes", downloaded);
        Ok(())
    }
}

/// Remove a leftover staging file, logging when that fails
fn discard(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Unpack `raw` if needed and move the result over `target`
///
/// The `.part` staging file never outlives a failed install.
fn install(raw: &Path, target: &Path, last_modified: Option<SystemTime>) -> Result<()> {
    let staged = sibling(target, ".part");
    let result = stage(raw, &staged, last_modified).and_then(|_| Ok(fs::rename(&staged, target)?));
    if result.is_err() {
        discard(&staged);
    }
    result
}

fn stage(raw: &Path, staged: &Path, last_modified: Option<SystemTime>) -> Result<()> {
    if decompress::is_xz_file(raw)? {
        decompress::decompress_xz(raw, staged)?;
    } else {
        fs::rename(raw, staged)?;
    }

    if let Some(time) = last_modified {
        File::options().write(true).open(staged)?.set_modified(time)?;
    }
    Ok(())
}

/// Runs the downloader before the reader first opens its file
///
/// A failed refresh is not fatal as long as an older copy exists on disk.
pub struct Refresher {
    downloader: Downloader,
}

impl Refresher {
    pub fn new(downloader: Downloader) -> Self {
        Self { downloader }
    }

    /// Run `refresh` to completion on a private runtime
    pub fn refresh_blocking(&self, path: &Path) -> Result<bool> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.downloader.refresh(path))
    }

    /// Download unconditionally on a private runtime
    pub fn download_blocking(&self, path: &Path) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.downloader.download(path))
    }
}

impl Prepare for Refresher {
    fn prepare(&self, path: &Path) -> Result<()> {
        match self.refresh_blocking(path) {
            Ok(true) => {
                log::info!("Database updated: {}", path.display());
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) if path.exists() => {
                log::warn!("Failed to refresh {}: {}; using the existing file", path.display(), e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
