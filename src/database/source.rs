//! Random-access byte sources backing the reader

use crate::error::{LocError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// Read-only, absolute-offset access to the database bytes
pub trait ByteSource: Send + Sync {
    /// Read up to `len` bytes at `offset`; fewer are returned only at end of file
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Total size in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hook run once before the database file is first opened
///
/// Implementations make sure the file exists and is reasonably current.
pub trait Prepare: Send + Sync {
    fn prepare(&self, path: &Path) -> Result<()>;
}

/// Plain file handle; the seek+read pair runs under a lock
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LocError::DatabaseNotFound(format!("{}", path.display()))
            } else {
                LocError::IoError(e)
            }
        })?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = self
            .file
            .lock()
            .map_err(|e| LocError::Other(format!("Failed to acquire file lock: {}", e)))?;

        file.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// Any in-memory byte buffer, including a memory map
pub struct SliceSource<T> {
    data: T,
}

impl<T: AsRef<[u8]> + Send + Sync> SliceSource<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: AsRef<[u8]> + Send + Sync> ByteSource for SliceSource<T> {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let data = self.data.as_ref();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn len(&self) -> u64 {
        self.data.as_ref().len() as u64
    }
}

pub type MmapSource = SliceSource<Mmap>;

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LocError::DatabaseNotFound(format!("{}", path.display()))
            } else {
                LocError::IoError(e)
            }
        })?;

        // The database is never written while mapped.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| LocError::corrupted(format!("Failed to memory map database: {}", e)))?;

        Ok(SliceSource::new(mmap))
    }
}
