//! # Key hashers for sticky candidate selection.
//!
//! [`P2c`](crate::P2c) derives its two candidates for a non-empty key from two
//! independent 32-bit hash families. Defaults are [`Crc32`] (IEEE polynomial) and
//! [`Fnv1a32`].

/// 32-bit hash over key bytes.
pub trait KeyHasher: Send + Sync + 'static {
    /// Hashes `key`.
    fn hash32(&self, key: &[u8]) -> u32;
}

/// CRC-32 (IEEE), via `crc32fast`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32;

impl KeyHasher for Crc32 {
    fn hash32(&self, key: &[u8]) -> u32 {
        crc32fast::hash(key)
    }
}

/// 32-bit FNV-1a.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fnv1a32;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

impl KeyHasher for Fnv1a32 {
    fn hash32(&self, key: &[u8]) -> u32 {
        key.iter()
            .fold(FNV_OFFSET, |h, &b| (h ^ u32::from(b)).wrapping_mul(FNV_PRIME))
    }
}
