use std::fmt;

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha512};

use crate::error::{CosiError, CosiResult};

/// Ed25519 signing key (private seed).
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 public key, as a compressed Edwards point.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl SigningKey {
    /// Fresh key from the OS random source.
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    /// Key from a 32-byte seed.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// The seed.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Expanded secret: the clamped signing scalar and the nonce prefix.
    pub(crate) fn expand(&self) -> (Scalar, [u8; 32]) {
        let hash = Sha512::digest(self.0.as_bytes());
        let mut lower = [0u8; 32];
        lower.copy_from_slice(&hash[..32]);
        lower[0] &= 248;
        lower[31] &= 127;
        lower[31] |= 64;
        let mut prefix = [0u8; 32];
        prefix.copy_from_slice(&hash[32..]);
        (Scalar::from_bytes_mod_order(lower), prefix)
    }
}

impl PublicKey {
    /// Create from raw 32 bytes; the bytes must encode a curve point.
    pub fn from_bytes(bytes: [u8; 32]) -> CosiResult<Self> {
        CompressedEdwardsY(bytes)
            .decompress()
            .ok_or(CosiError::InvalidKey)?;
        Ok(Self(bytes))
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> CosiResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CosiError::InvalidKey)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CosiError::InvalidKey)?;
        Self::from_bytes(arr)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn point(&self) -> CosiResult<EdwardsPoint> {
        CompressedEdwardsY(self.0)
            .decompress()
            .ok_or(CosiError::InvalidKey)
    }

    pub(crate) fn from_point(point: &EdwardsPoint) -> Self {
        Self(point.compress().to_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
