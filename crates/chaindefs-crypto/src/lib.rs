//! Cryptographic primitives for chain definitions.
//!
//! Provides keyed BLAKE3 content digests for change detection,
//! a SHA-256 binary Merkle tree with inclusion proofs, and Ed25519 collective
//! (CoSi) signatures over the Merkle root.

pub mod cosi;
pub mod error;
pub mod hasher;
pub mod keys;
pub mod merkle;

pub use cosi::{
    combine_keys, dev_authorized_keys, sign_with_dev_keys, sign_with_keys, sign_with_keys_until,
    verify, AuthorizedKeys, CosiSession, CosiSignature, NonceCommitment, PartialSignature,
    SecretNonce, SignerMask, DEV_PRIVATE_KEYS,
};
pub use error::{CosiError, CosiResult, HasherError, HasherResult, MerkleError, MerkleResult};
pub use hasher::ContentHasher;
pub use keys::{PublicKey, SigningKey};
pub use merkle::{MerkleProof, MerkleTree, ProofStep, Side};
