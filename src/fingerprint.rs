use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use camino::Utf8Path;
use sha2::{Digest, Sha256};

use crate::errors::ScanError;

/// Chunk size for streaming reads.
const CHUNK_SIZE: usize = 64 * 1024;

/// Files at or below this size are hashed in full.
const SMALL_FILE_LIMIT: u64 = 128 * 1024;

/// Size of each anchored sample region.
const SAMPLE_SIZE: u64 = 16 * 1024;

/// The middle sample offset is rounded down to this boundary.
const SAMPLE_ALIGN: u64 = 4 * 1024;

/// Streamed CRC32 of the whole file, as 8 lowercase hex chars. The empty
/// file checksums to `00000000`.
pub fn crc32_hex(path: &Utf8Path) -> Result<String, ScanError> {
    let mut file = File::open(path).map_err(|e| ScanError::from_io(e, path.as_str()))?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| ScanError::from_io(e, path.as_str()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:08x}", hasher.finalize()))
}

/// Anchored content fingerprint: SHA-256 over either the full contents
/// (small files) or three 16 KiB samples (head, aligned middle, tail),
/// always followed by the file size as a big-endian u64. Any change to a
/// sampled region or to the length changes the fingerprint.
pub fn content_fingerprint(path: &Utf8Path, file_size: u64) -> Result<String, ScanError> {
    let mut file = File::open(path).map_err(|e| ScanError::from_io(e, path.as_str()))?;
    let mut hasher = Sha256::new();

    if file_size <= SMALL_FILE_LIMIT {
        stream_into(&mut file, &mut hasher, path)?;
    } else {
        let middle = ((file_size / 2).saturating_sub(SAMPLE_SIZE / 2) / SAMPLE_ALIGN)
            * SAMPLE_ALIGN;
        let tail = file_size.saturating_sub(SAMPLE_SIZE);

        hash_region(&mut file, &mut hasher, 0, path)?;
        hash_region(&mut file, &mut hasher, middle, path)?;
        hash_region(&mut file, &mut hasher, tail, path)?;
    }

    hasher.update(file_size.to_be_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Full-file SHA-256 of a JSON sidecar. Sidecars are a few KiB at most, but
/// the read is streamed anyway.
pub fn sidecar_fingerprint(path: &Utf8Path) -> Result<String, ScanError> {
    let mut file = File::open(path).map_err(|e| ScanError::from_io(e, path.as_str()))?;
    let mut hasher = Sha256::new();
    stream_into(&mut file, &mut hasher, path)?;
    Ok(hex::encode(hasher.finalize()))
}

fn stream_into(file: &mut File, hasher: &mut Sha256, path: &Utf8Path) -> Result<(), ScanError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| ScanError::from_io(e, path.as_str()))?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buf[..n]);
    }
}

fn hash_region(
    file: &mut File,
    hasher: &mut Sha256,
    offset: u64,
    path: &Utf8Path,
) -> Result<(), ScanError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| ScanError::from_io(e, path.as_str()))?;

    let mut remaining = SAMPLE_SIZE as usize;
    let mut buf = vec![0u8; remaining.min(CHUNK_SIZE)];
    while remaining > 0 {
        let want = remaining.min(buf.len());
        let n = file
            .read(&mut buf[..want])
            .map_err(|e| ScanError::from_io(e, path.as_str()))?;
        if n == 0 {
            break; // region runs past EOF, hash what was there
        }
        hasher.update(&buf[..n]);
        remaining -= n;
    }
    Ok(())
}
