//! Content-addressed digests for symbol options and composite identity.

use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit SHA-256 digest over some piece of scan-result content.
///
/// Used to deduplicate option strings beyond plain string equality (callers
/// may hash normalized/structured payloads before calling
/// [`Fingerprint::of`]) and to give symbol items and composites a stable
/// cache key that an external collaborator (e.g. a Redis-backed result
/// cache) could key off of.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash a byte slice into a fingerprint.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Hash a string into a fingerprint.
    pub fn of_str(s: &str) -> Self {
        Self::of(s.as_bytes())
    }

    /// Combine this fingerprint with another, order-sensitively.
    pub fn combine(&self, other: &Fingerprint) -> Fingerprint {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&self.0);
        buf.extend_from_slice(&other.0);
        Fingerprint::of(&buf)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}
