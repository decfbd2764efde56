//! Canonical content hashing
//!
//! Every artifact in the store carries a content hash of the form
//! `sha256:<64 lowercase hex chars>`. The helpers here are the only place
//! hashes are produced, so the format stays uniform across components.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

/// Prefix shared by every canonical hash
pub const HASH_PREFIX: &str = "sha256:";

/// Buffer size for streaming file hashing
const FILE_HASH_BUF: usize = 64 * 1024;

/// Hash a UTF-8 string into the canonical `sha256:<hex>` form
#[must_use]
pub fn compute_hash(content: &str) -> String {
    compute_bytes_hash(content.as_bytes())
}

/// Hash raw bytes into the canonical `sha256:<hex>` form
#[must_use]
pub fn compute_bytes_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{HASH_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Hash an ordered set of parts as one composite value
///
/// Parts are joined with `\n` so `["a", "b"]` and `["ab"]` hash
/// differently.
#[must_use]
pub fn compute_composite_hash(parts: &[&str]) -> String {
    compute_hash(&parts.join("\n"))
}

/// Hash a file's contents by streaming it from disk
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        StoreError::Storage(format!("cannot open {} for hashing: {e}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; FILE_HASH_BUF];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{HASH_PREFIX}{}", hex::encode(hasher.finalize())))
}

/// Canonical content hash of an embedding vector
///
/// The canonical content of a vector is the base64 encoding of its
/// little-endian float bytes; the hash is computed over that string so a
/// stored vector can be verified without re-running the model.
#[must_use]
pub fn vector_content_hash(vector: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    compute_hash(&encoded)
}

/// True when `value` matches the canonical `sha256:<64 lowercase hex>` form
#[must_use]
pub fn is_valid_hash(value: &str) -> bool {
    let Some(rest) = value.strip_prefix(HASH_PREFIX) else {
        return false;
    };
    rest.len() == 64
        && rest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
