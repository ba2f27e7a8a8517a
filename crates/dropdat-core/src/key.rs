//! Archive keys
//!
//! An archive is addressed by the 32-byte public half of an ed25519 keypair.
//! On the wire (gateway handshake) the raw bytes are sent; in URLs and logs
//! the canonical form is 64 lowercase hex characters.

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Size of an archive key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the hex form of an archive key
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;

/// Key codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("archive key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("archive key must be 64 lowercase hex characters")]
    InvalidKeyFormat,
}

/// Public key identifying an archive
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchiveKey([u8; KEY_LEN]);

impl ArchiveKey {
    /// Wrap raw key bytes
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice of exactly [`KEY_LEN`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let raw: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(raw))
    }

    /// Generate a fresh keypair, returning the public key and the signing
    /// key that makes the local copy writable
    pub fn generate() -> (Self, SigningKey) {
        let signing = SigningKey::from_bytes(&rand::random::<[u8; KEY_LEN]>());
        let key = Self::from(signing.verifying_key());
        (key, signing)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Canonical hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<VerifyingKey> for ArchiveKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveKey({})", self.to_hex())
    }
}

impl FromStr for ArchiveKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Encode raw key bytes as lowercase hex
pub fn encode(raw: &[u8]) -> Result<String, KeyError> {
    ArchiveKey::from_slice(raw).map(|key| key.to_hex())
}

/// Decode the canonical hex form of a key.
///
/// Only lowercase hex is accepted, so every key has exactly one textual form.
pub fn decode(hex_key: &str) -> Result<ArchiveKey, KeyError> {
    if !is_key_hex(hex_key) {
        return Err(KeyError::InvalidKeyFormat);
    }
    let mut raw = [0u8; KEY_LEN];
    hex::decode_to_slice(hex_key, &mut raw).map_err(|_| KeyError::InvalidKeyFormat)?;
    Ok(ArchiveKey(raw))
}

/// Check whether `s` is exactly 64 lowercase hex characters
pub fn is_key_hex(s: &str) -> bool {
    s.len() == KEY_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
