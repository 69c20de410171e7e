//! SHA-256 digests and the double-SHA-256 checksum.
//!
//! Bitcoin uses `SHA256(SHA256(x))` for message checksums, block and
//! transaction ids. The wire carries hashes in internal (little-endian)
//! byte order; block explorers print them reversed.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use primitive_types::U256;
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest.
///
/// Ordering compares from the most significant byte, which is the *last*
/// array index in internal byte order. Hashing only uses the trailing four
/// bytes: proof-of-work hashes start with zeros and make poor bucket keys.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Sha256Hash([u8; 32]);

impl Sha256Hash {
    pub const LENGTH: usize = 32;
    pub const ZERO: Sha256Hash = Sha256Hash([0u8; 32]);

    pub const fn wrap(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Wraps bytes given in display (reversed) order.
    pub fn from_reversed(mut bytes: [u8; 32]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    /// `SHA256(SHA256(contents))` as a digest value.
    pub fn twice_of(contents: &[u8]) -> Self {
        Self(double_sha256(contents))
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub const fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Bytes in reversed order, as printed by block explorers.
    pub fn reversed(&self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }

    /// The bytes read as an unsigned big-endian integer.
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }
}

impl Ord for Sha256Hash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for Sha256Hash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Sha256Hash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let tail: [u8; 4] = [self.0[28], self.0[29], self.0[30], self.0[31]];
        state.write_u32(u32::from_be_bytes(tail));
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Hash({})", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Sha256Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Single SHA-256 pass.
pub fn sha256(bytes: &[u8]) -> Sha256Hash {
    Sha256Hash(Sha256::digest(bytes).into())
}

/// `SHA256(SHA256(bytes))`.
pub fn double_sha256(bytes: &[u8]) -> [u8; 32] {
    let mut h = DoubleSha256::new();
    h.update(bytes);
    h.finalize()
}

/// `SHA256(SHA256(a || b))` without concatenating the inputs.
pub fn double_sha256_parts(a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut h = DoubleSha256::new();
    h.update(a);
    h.update(b);
    h.finalize()
}

/// Message header checksum: first 4 bytes of `SHA256(SHA256(payload))`.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Incremental double SHA-256, for payloads produced in pieces.
#[derive(Clone, Default)]
pub struct DoubleSha256 {
    inner: Sha256,
}

impl DoubleSha256 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finalize(self) -> [u8; 32] {
        let first = self.inner.finalize();
        Sha256::digest(first).into()
    }
}
