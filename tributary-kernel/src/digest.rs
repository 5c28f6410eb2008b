use std::path::Path;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Digest of a file's full contents. Absent or unreadable files hash to the
/// empty string; callers treat that sentinel as "no file", and no real digest
/// is ever empty.
pub fn hash_file<P: AsRef<Path>>(path: P) -> String {
    match std::fs::read(path) {
        Ok(bytes) => hash_bytes(&bytes),
        Err(_) => String::new(),
    }
}
