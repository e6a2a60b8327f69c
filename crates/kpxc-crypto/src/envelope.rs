//! Authenticated public-key envelope.
//!
//! `seal` and `open` wrap the NaCl box construction: X25519 key agreement
//! between our secret key and the peer's public key, then XSalsa20-Poly1305
//! over the payload. The ciphertext carries a 16-byte Poly1305 tag, so any
//! change to the ciphertext, nonce or keys makes `open` fail instead of
//! returning corrupted plaintext.

use std::fmt;

use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use thiserror::Error;
use zeroize::Zeroize;

use crate::nonce::Nonce;

/// Curve25519 key width.
pub const KEY_LEN: usize = 32;

/// Envelope errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The ciphertext did not authenticate under the given nonce and keys.
    #[error("failed to open message")]
    AuthFailure,

    #[error("failed to seal message")]
    Encryption,

    #[error("invalid public key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Curve25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn to_box_key(self) -> crypto_box::PublicKey {
        crypto_box::PublicKey::from(self.0)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = EnvelopeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| EnvelopeError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..)")
    }
}

/// Curve25519 secret key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey(crypto_box::SecretKey);

impl SecretKey {
    /// Generate a new secret key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = crate::random_bytes::<KEY_LEN>();
        let key = Self::from_bytes(bytes);
        bytes.zeroize();
        key
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(crypto_box::SecretKey::from(bytes))
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.public_key().as_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Ephemeral key pair, generated once per proxy connection.
#[derive(Debug, Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate())
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

/// Encrypt and authenticate `plaintext` for `peer`.
pub fn seal(
    plaintext: &[u8],
    nonce: &Nonce,
    peer: &PublicKey,
    own: &SecretKey,
) -> Result<Vec<u8>, EnvelopeError> {
    let salsa_box = SalsaBox::new(&peer.to_box_key(), &own.0);
    salsa_box
        .encrypt(GenericArray::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|_| EnvelopeError::Encryption)
}

/// Verify and decrypt a message sealed by `peer`.
///
/// # Errors
/// Returns `EnvelopeError::AuthFailure` when the tag does not verify.
pub fn open(
    ciphertext: &[u8],
    nonce: &Nonce,
    peer: &PublicKey,
    own: &SecretKey,
) -> Result<Vec<u8>, EnvelopeError> {
    let salsa_box = SalsaBox::new(&peer.to_box_key(), &own.0);
    salsa_box
        .decrypt(GenericArray::from_slice(nonce.as_bytes()), ciphertext)
        .map_err(|_| EnvelopeError::AuthFailure)
}
