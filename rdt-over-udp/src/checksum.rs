//! Fixed-width additive checksum carried in every frame.
//!
//! The digest is the sum of all payload byte values, written big-endian and
//! cut down to its lowest [`CHECKSUM_LEN`] bytes, so it is always exactly
//! nine bytes wide no matter how long the payload is.
//!
//! This is not a CRC.  It defines the protocol's error-detection ceiling:
//! - reordering bytes inside a payload leaves the sum unchanged;
//! - two corruptions that cancel out (`+k` on one byte, `-k` on another) go
//!   unnoticed;
//! - sums wider than nine bytes are truncated.
//!
//! A single flipped bit always changes the sum, which is the fault the
//! simulator injects.

/// Width of the on-wire digest in bytes.
pub const CHECKSUM_LEN: usize = 9;

/// Compute the digest of `payload`.
pub fn compute(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let sum: u128 = payload.iter().map(|&b| u128::from(b)).sum();
    let wide = sum.to_be_bytes();
    let mut digest = [0u8; CHECKSUM_LEN];
    digest.copy_from_slice(&wide[wide.len() - CHECKSUM_LEN..]);
    digest
}

/// `true` when `digest` matches the recomputed digest of `payload`.
pub fn verify(payload: &[u8], digest: &[u8]) -> bool {
    digest == compute(payload)
}
