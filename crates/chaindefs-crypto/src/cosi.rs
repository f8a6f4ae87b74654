//! Ed25519 collective signing (CoSi).
//!
//! A subset of the authorized signers jointly produces one standard Ed25519
//! signature over a message (the Merkle root). The result verifies against
//! the sum of the participating public keys, and carries a bitmask naming
//! which authorized keys took part.
//!
//! Signing proceeds in two rounds driven by [`CosiSession`]: every
//! participant publishes a nonce commitment, the session sums them into a
//! global commitment, then every participant returns a partial signature
//! which the session sums into the final signature.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::Verifier;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha512};

use chaindefs_types::limits::MIN_SIGNERS;

use crate::error::{CosiError, CosiResult};
use crate::keys::{PublicKey, SigningKey};

/// Development signing keys. Never use these for production data.
pub const DEV_PRIVATE_KEYS: [[u8; 32]; 3] = [[0xdd; 32], [0xde; 32], [0xdf; 32]];

/// Maximum number of authorized keys; the signer mask is one byte.
pub const MAX_AUTHORIZED_KEYS: usize = 8;

/// Authorized keys matching [`DEV_PRIVATE_KEYS`].
pub fn dev_authorized_keys() -> AuthorizedKeys {
    AuthorizedKeys(
        DEV_PRIVATE_KEYS
            .iter()
            .map(|seed| SigningKey::from_bytes(*seed).public_key())
            .collect(),
    )
}

/// Bitmask of participating signers: bit `i` means authorized key `i` signed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerMask(u8);

impl SignerMask {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Build a mask from signer indices. Fails on out-of-range or repeated
    /// indices.
    pub fn from_indices(indices: &[usize]) -> CosiResult<Self> {
        let mut bits = 0u8;
        for &index in indices {
            if index >= MAX_AUTHORIZED_KEYS {
                return Err(CosiError::NotParticipating(index));
            }
            let bit = 1u8 << index;
            if bits & bit != 0 {
                return Err(CosiError::DuplicateContribution(index));
            }
            bits |= bit;
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, index: usize) -> bool {
        index < MAX_AUTHORIZED_KEYS && self.0 & (1 << index) != 0
    }

    /// Participating indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        (0..MAX_AUTHORIZED_KEYS)
            .filter(|i| self.contains(*i))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }
}

impl fmt::Display for SignerMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.0)
    }
}

/// Ordered list of authorized signer public keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PublicKey>", into = "Vec<PublicKey>")]
pub struct AuthorizedKeys(Vec<PublicKey>);

impl AuthorizedKeys {
    pub fn new(keys: Vec<PublicKey>) -> CosiResult<Self> {
        if keys.len() > MAX_AUTHORIZED_KEYS {
            return Err(CosiError::TooManyKeys(keys.len()));
        }
        Ok(Self(keys))
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of `key` in the authorized list.
    pub fn position(&self, key: &PublicKey) -> Option<usize> {
        self.0.iter().position(|k| k == key)
    }

    /// Keys selected by `mask`, failing if the mask names a missing index.
    pub fn select(&self, mask: SignerMask) -> CosiResult<Vec<PublicKey>> {
        mask.indices()
            .into_iter()
            .map(|i| self.0.get(i).copied().ok_or(CosiError::NotParticipating(i)))
            .collect()
    }
}

impl TryFrom<Vec<PublicKey>> for AuthorizedKeys {
    type Error = CosiError;

    fn try_from(keys: Vec<PublicKey>) -> CosiResult<Self> {
        Self::new(keys)
    }
}

impl From<AuthorizedKeys> for Vec<PublicKey> {
    fn from(keys: AuthorizedKeys) -> Self {
        keys.0
    }
}

/// Sum public keys into the combined verification key.
pub fn combine_keys(keys: &[PublicKey]) -> CosiResult<PublicKey> {
    if keys.is_empty() {
        return Err(CosiError::InvalidKey);
    }
    let points = keys
        .iter()
        .map(PublicKey::point)
        .collect::<CosiResult<Vec<_>>>()?;
    Ok(PublicKey::from_point(&points.iter().sum::<EdwardsPoint>()))
}

/// A signer's secret nonce for one session. Consumed by
/// [`SigningKey::sign_partial`].
pub struct SecretNonce(Scalar);

impl fmt::Debug for SecretNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretNonce(<redacted>)")
    }
}

/// Public commitment `R = r·B` to a secret nonce, or the sum of several.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NonceCommitment(EdwardsPoint);

impl NonceCommitment {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> CosiResult<Self> {
        curve25519_dalek::edwards::CompressedEdwardsY(bytes)
            .decompress()
            .map(Self)
            .ok_or_else(|| CosiError::Malformed("commitment is not a curve point".into()))
    }
}

impl fmt::Debug for NonceCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NonceCommitment({})", hex::encode(self.to_bytes()))
    }
}

/// One signer's share `s_i = r_i + k·a_i` of the final signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PartialSignature(Scalar);

impl PartialSignature {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> CosiResult<Self> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
            .map(Self)
            .ok_or_else(|| CosiError::Malformed("partial signature is not canonical".into()))
    }
}

impl fmt::Debug for PartialSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartialSignature({})", hex::encode(self.to_bytes()))
    }
}

impl SigningKey {
    /// Derive a deterministic nonce for `message` and its commitment.
    ///
    /// `counter` must differ between signers sharing a key seed prefix; any
    /// value is fine for distinct keys.
    pub fn commit(&self, message: &[u8], counter: u32) -> (SecretNonce, NonceCommitment) {
        let (_, prefix) = self.expand();
        let mut hasher = Sha512::new();
        hasher.update(prefix);
        hasher.update(message);
        hasher.update(counter.to_be_bytes());
        let r = Scalar::from_bytes_mod_order_wide(&wide(&hasher.finalize()));
        (SecretNonce(r), NonceCommitment(EdwardsPoint::mul_base(&r)))
    }

    /// Produce this signer's partial signature against the session's global
    /// commitment and combined key.
    pub fn sign_partial(
        &self,
        message: &[u8],
        global_key: &PublicKey,
        global_commitment: &NonceCommitment,
        nonce: SecretNonce,
    ) -> PartialSignature {
        let (a, _) = self.expand();
        let k = challenge(global_commitment, global_key, message);
        PartialSignature(nonce.0 + k * a)
    }
}

fn wide(bytes: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(bytes);
    out
}

fn challenge(commitment: &NonceCommitment, key: &PublicKey, message: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(commitment.to_bytes());
    hasher.update(key.as_bytes());
    hasher.update(message);
    Scalar::from_bytes_mod_order_wide(&wide(&hasher.finalize()))
}

/// A collective signature: the signer mask followed by the 64-byte Ed25519
/// signature `R || S`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CosiSignature {
    pub mask: SignerMask,
    pub signature: [u8; 64],
}

impl CosiSignature {
    /// Encoded length: one mask byte plus the Ed25519 signature.
    pub const LEN: usize = 65;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.mask.bits();
        out[1..].copy_from_slice(&self.signature);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CosiResult<Self> {
        if bytes.len() != Self::LEN {
            return Err(CosiError::Malformed(format!(
                "expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[1..]);
        Ok(Self {
            mask: SignerMask::from_bits(bytes[0]),
            signature,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> CosiResult<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CosiError::Malformed(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for CosiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosiSignature")
            .field("mask", &self.mask)
            .field("signature", &hex::encode(self.signature))
            .finish()
    }
}

/// State of one collective signing run over a fixed message and signer set.
#[derive(Debug)]
pub struct CosiSession {
    message: Vec<u8>,
    mask: SignerMask,
    global_key: PublicKey,
    commitments: BTreeMap<usize, NonceCommitment>,
    global_commitment: Option<NonceCommitment>,
    partials: BTreeMap<usize, PartialSignature>,
    deadline: Option<Instant>,
}

impl CosiSession {
    /// Start a session in which the signers named by `mask` take part.
    pub fn new(message: &[u8], authorized: &AuthorizedKeys, mask: SignerMask) -> CosiResult<Self> {
        if mask.count() < MIN_SIGNERS {
            return Err(CosiError::InsufficientSigners {
                present: mask.count(),
                required: MIN_SIGNERS,
            });
        }
        let keys = authorized.select(mask)?;
        let global_key = combine_keys(&keys)?;
        tracing::debug!(mask = %mask, global_key = %global_key, "cosi session opened");
        Ok(Self {
            message: message.to_vec(),
            mask,
            global_key,
            commitments: BTreeMap::new(),
            global_commitment: None,
            partials: BTreeMap::new(),
            deadline: None,
        })
    }

    /// Fail any later step once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn mask(&self) -> SignerMask {
        self.mask
    }

    /// Sum of the participating public keys.
    pub fn global_key(&self) -> PublicKey {
        self.global_key
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Record signer `index`'s nonce commitment.
    pub fn add_commitment(&mut self, index: usize, commitment: NonceCommitment) -> CosiResult<()> {
        self.check_deadline()?;
        self.check_participant(index)?;
        if self.global_commitment.is_some() {
            return Err(CosiError::Incomplete(
                "commitments are closed once the global commitment is published".into(),
            ));
        }
        if self.commitments.insert(index, commitment).is_some() {
            return Err(CosiError::DuplicateContribution(index));
        }
        Ok(())
    }

    /// Close the commitment round and return the summed commitment.
    pub fn global_commitment(&mut self) -> CosiResult<NonceCommitment> {
        self.check_deadline()?;
        if let Some(commitment) = self.global_commitment {
            return Ok(commitment);
        }
        if self.commitments.len() != self.mask.count() {
            return Err(CosiError::Incomplete(format!(
                "{} of {} commitments received",
                self.commitments.len(),
                self.mask.count()
            )));
        }
        let sum = NonceCommitment(self.commitments.values().map(|c| c.0).sum());
        self.global_commitment = Some(sum);
        Ok(sum)
    }

    /// Record signer `index`'s partial signature.
    pub fn add_partial(&mut self, index: usize, partial: PartialSignature) -> CosiResult<()> {
        self.check_deadline()?;
        self.check_participant(index)?;
        if self.global_commitment.is_none() {
            return Err(CosiError::Incomplete(
                "global commitment has not been published".into(),
            ));
        }
        if self.partials.insert(index, partial).is_some() {
            return Err(CosiError::DuplicateContribution(index));
        }
        Ok(())
    }

    /// Combine all partial signatures and check the result verifies.
    pub fn finish(self) -> CosiResult<CosiSignature> {
        self.check_deadline()?;
        let commitment = self
            .global_commitment
            .ok_or_else(|| CosiError::Incomplete("no global commitment".into()))?;
        if self.partials.len() != self.mask.count() {
            return Err(CosiError::Incomplete(format!(
                "{} of {} partial signatures received",
                self.partials.len(),
                self.mask.count()
            )));
        }
        let s: Scalar = self.partials.values().map(|p| p.0).sum();
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&commitment.to_bytes());
        signature[32..].copy_from_slice(s.as_bytes());
        verify_with_key(&signature, &self.message, &self.global_key)?;
        tracing::debug!(mask = %self.mask, "cosi signature combined");
        Ok(CosiSignature {
            mask: self.mask,
            signature,
        })
    }

    fn check_participant(&self, index: usize) -> CosiResult<()> {
        if self.mask.contains(index) {
            Ok(())
        } else {
            Err(CosiError::NotParticipating(index))
        }
    }

    fn check_deadline(&self) -> CosiResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CosiError::Timeout),
            _ => Ok(()),
        }
    }
}

/// Run a complete session locally with every key in `keys`.
pub fn sign_with_keys(
    message: &[u8],
    keys: &[SigningKey],
    authorized: &AuthorizedKeys,
) -> CosiResult<CosiSignature> {
    sign_with_keys_until(message, keys, authorized, None)
}

/// Like [`sign_with_keys`], failing with [`CosiError::Timeout`] once
/// `deadline` has passed.
pub fn sign_with_keys_until(
    message: &[u8],
    keys: &[SigningKey],
    authorized: &AuthorizedKeys,
    deadline: Option<Instant>,
) -> CosiResult<CosiSignature> {
    let indices = keys
        .iter()
        .map(|key| {
            let public = key.public_key();
            authorized
                .position(&public)
                .ok_or_else(|| CosiError::UnauthorizedSigner(public.to_hex()))
        })
        .collect::<CosiResult<Vec<_>>>()?;
    let mask = SignerMask::from_indices(&indices)?;
    let mut session = CosiSession::new(message, authorized, mask)?;
    if let Some(deadline) = deadline {
        session = session.with_deadline(deadline);
    }

    let mut nonces = Vec::with_capacity(keys.len());
    for (counter, (key, &index)) in keys.iter().zip(&indices).enumerate() {
        let (nonce, commitment) = key.commit(message, counter as u32);
        session.add_commitment(index, commitment)?;
        nonces.push(nonce);
    }
    let global_commitment = session.global_commitment()?;
    let global_key = session.global_key();
    for ((key, &index), nonce) in keys.iter().zip(&indices).zip(nonces) {
        let partial = key.sign_partial(message, &global_key, &global_commitment, nonce);
        session.add_partial(index, partial)?;
    }
    session.finish()
}

/// Sign with all development keys.
pub fn sign_with_dev_keys(message: &[u8]) -> CosiResult<CosiSignature> {
    tracing::warn!("signing with development keys");
    let keys: Vec<SigningKey> = DEV_PRIVATE_KEYS
        .iter()
        .map(|seed| SigningKey::from_bytes(*seed))
        .collect();
    sign_with_keys(message, &keys, &dev_authorized_keys())
}

/// Verify a collective signature over `message`.
///
/// The mask must name at least two authorized keys; the signature must
/// verify as plain Ed25519 against their sum.
pub fn verify(
    signature: &CosiSignature,
    message: &[u8],
    authorized: &AuthorizedKeys,
) -> CosiResult<()> {
    if signature.mask.count() < MIN_SIGNERS {
        return Err(CosiError::InvalidSignature);
    }
    let keys = authorized
        .select(signature.mask)
        .map_err(|_| CosiError::InvalidSignature)?;
    let combined = combine_keys(&keys)?;
    verify_with_key(&signature.signature, message, &combined)
}

fn verify_with_key(signature: &[u8; 64], message: &[u8], key: &PublicKey) -> CosiResult<()> {
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(key.as_bytes())
        .map_err(|_| CosiError::InvalidKey)?;
    verifying_key
        .verify(message, &ed25519_dalek::Signature::from_bytes(signature))
        .map_err(|_| CosiError::InvalidSignature)
}
