//! Chunked model artifact handling
//!
//! Model weights are distributed as numbered chunks (`640m.onnx.0`,
//! `640m.onnx.1`, ...) to stay under per-file size limits. Reassembly is
//! plain concatenation in ascending index order; the loader only ever sees
//! the fully reassembled bytes.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Reassemble a chunked model artifact into a single byte buffer.
///
/// Reads `<base>.0`, `<base>.1`, ... until the first missing index.
/// Errors if `<base>.0` does not exist.
pub fn read_chunked(base: &Path) -> Result<Vec<u8>, ScanError> {
    let mut bytes = Vec::new();
    let mut index = 0u32;
    loop {
        let chunk = chunk_path(base, index);
        if !chunk.exists() {
            break;
        }
        bytes.extend(fs::read(&chunk)?);
        index += 1;
    }
    if index == 0 {
        return Err(ScanError::MissingChunks(base.to_path_buf()));
    }
    tracing::debug!("reassembled {} chunk(s), {} bytes", index, bytes.len());
    Ok(bytes)
}

/// Split a model file into numbered chunks next to the original.
///
/// Maintenance helper for producing distributable artifacts; the inverse of
/// [`read_chunked`]. Returns the number of chunks written.
pub fn split_into_chunks(path: &Path, chunk_size_mb: usize) -> Result<usize, ScanError> {
    let bytes = fs::read(path)?;
    let chunk_size = chunk_size_mb * 1024 * 1024;
    let mut count = 0;
    for (index, chunk) in bytes.chunks(chunk_size).enumerate() {
        fs::write(chunk_path(path, index as u32), chunk)?;
        count += 1;
    }
    Ok(count)
}

fn chunk_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}
