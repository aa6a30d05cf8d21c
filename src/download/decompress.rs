//! XZ detection and decompression for downloaded databases

use crate::error::{LocError, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// XZ stream header: fd 37 7a 58 5a 00
pub const XZ_MAGIC: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

pub fn is_xz(data: &[u8]) -> bool {
    data.starts_with(&XZ_MAGIC)
}

/// Whether the file at `path` starts with the XZ magic
pub fn is_xz_file(path: &Path) -> Result<bool> {
    let mut head = [0u8; XZ_MAGIC.len()];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(is_xz(&head[..filled]))
}

/// Decompress `src` into `dest`, returning the number of bytes written
pub fn decompress_xz(src: &Path, dest: &Path) -> Result<u64> {
    log::info!("Decompressing {} -> {}", src.display(), dest.display());

    let mut decoder = xz2::read::XzDecoder::new(BufReader::new(File::open(src)?));
    let mut out = BufWriter::new(File::create(dest)?);

    let written = io::copy(&mut decoder, &mut out)
        .map_err(|e| LocError::download(format!("Failed to decompress {}: {}", src.display(), e)))?;
    out.flush()?;

    log::debug!("Decompressed {} bytes", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xz2::write::XzEncoder;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_detect_magic() {
        assert!(is_xz(&compress(b"LOCDBXX")));
        assert!(!is_xz(b"LOCDBXX\x01"));
        assert!(!is_xz(&XZ_MAGIC[..3]));
    }

    #[test]
    fn test_decompress_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("location.db.xz");
        let dest = dir.path().join("location.db");
        let payload = b"LOCDBXX\x01 some database bytes".repeat(100);
        std::fs::write(&src, compress(&payload)).unwrap();

        assert!(is_xz_file(&src).unwrap());
        assert_eq!(decompress_xz(&src, &dest).unwrap(), payload.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
        assert!(!is_xz_file(&dest).unwrap());
    }

    #[test]
    fn test_short_file_is_not_xz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny");
        std::fs::write(&path, [0xfd, 0x37]).unwrap();
        assert!(!is_xz_file(&path).unwrap());
    }

    #[test]
    fn test_corrupt_stream() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.xz");
        let mut data = compress(b"payload payload payload");
        let len = data.len();
        data.truncate(len / 2);
        std::fs::write(&src, data).unwrap();

        let err = decompress_xz(&src, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, LocError::DownloadError(_)));
    }
}
