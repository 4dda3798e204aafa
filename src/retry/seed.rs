use sha2::{Digest, Sha256};

/// Derives the shared retry seed for `message`: the first eight bytes of its
/// SHA-256 digest read as a big-endian signed integer.
///
/// Every operator hashing the same message arrives at the same seed.
pub fn retry_seed(message: &[u8]) -> i64 {
    let digest = Sha256::digest(message);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix)
}
