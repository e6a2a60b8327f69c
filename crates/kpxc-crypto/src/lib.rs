//! Cryptographic primitives for the KeePassXC browser protocol.
//!
//! This crate provides:
//! - Ephemeral Curve25519 key pairs for one proxy connection
//! - The authenticated box envelope (`seal` / `open`)
//! - The 24-byte nonce cursor with little-endian carry increment
//!
//! # Design
//!
//! Every encrypted message is a NaCl `crypto_box` (X25519 + XSalsa20-Poly1305).
//! Both peers derive the next nonce from the last one they saw, so the
//! increment here must match KeePassXC's `sodium_increment` bit for bit.

#![forbid(unsafe_code)]

pub mod envelope;
pub mod nonce;

pub use envelope::{open, seal, EnvelopeError, KeyPair, PublicKey, SecretKey, KEY_LEN};
pub use nonce::{Nonce, NonceLengthError, NONCE_LEN};

use rand::rngs::OsRng;
use rand::RngCore;

/// Fill a fixed-size array from the OS CSPRNG.
///
/// Used for client identifiers and identity keys, which share the nonce width.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
