//! Nonce cursor for the box envelope.
//!
//! The protocol never sends a fresh random nonce per message. After the key
//! exchange the client increments the last nonce it saw, the peer answers with
//! the increment of that, and so on.
//!
//! # Increment
//!
//! The 24 bytes are a little-endian counter: byte 0 is incremented first and a
//! carry out of any byte moves into the next one. Incrementing the all-ones
//! value wraps to zero.

use std::fmt;

use thiserror::Error;

/// Nonce width of the XSalsa20-Poly1305 box.
pub const NONCE_LEN: usize = 24;

/// A nonce had the wrong number of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid nonce length: expected {NONCE_LEN} bytes, got {0}")]
pub struct NonceLengthError(pub usize);

/// 24-byte box nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Generate a random nonce from the OS CSPRNG.
    pub fn random() -> Self {
        Self(crate::random_bytes())
    }

    /// Wrap raw nonce bytes.
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    /// Return the nonce that follows this one.
    pub fn increment(&self) -> Self {
        let mut out = [0u8; NONCE_LEN];
        let mut carry: u16 = 1;
        for (dst, src) in out.iter_mut().zip(self.0.iter()) {
            carry += u16::from(*src);
            *dst = carry as u8;
            carry >>= 8;
        }
        Self(out)
    }
}

impl TryFrom<&[u8]> for Nonce {
    type Error = NonceLengthError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; NONCE_LEN] = bytes
            .try_into()
            .map_err(|_| NonceLengthError(bytes.len()))?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for Nonce {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}
