//! SHA-256 helpers shared by the pseudo-signer and target inspection
//!
//! Everything that needs a digest goes through this module so the algorithm is
//! chosen in one place. Digests are rendered as lowercase hex, the form used
//! throughout the signed documents.

use crate::errors::{Result, TrustError};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Length in hex characters of one digest
pub const DIGEST_HEX_LEN: usize = 64;

const READ_CHUNK: usize = 64 * 1024;

/// Hash bytes and return the lowercase hex digest
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash a file's content, returning `(hex digest, byte length)`
///
/// The file is streamed so large package archives are never held in memory.
pub fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let mut file = File::open(path).map_err(|e| TrustError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut length = 0u64;

    loop {
        let n = file.read(&mut buf).map_err(|e| TrustError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        length += n as u64;
    }

    Ok((hex::encode(hasher.finalize()), length))
}
