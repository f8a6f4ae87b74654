use chaindefs_types::Digest;

/// Errors from Merkle tree operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MerkleError {
    /// A proof was requested for a leaf that is not in the tree.
    #[error("leaf not found in tree: {0}")]
    NotFound(Digest),

    /// An encoded proof could not be decoded.
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// The proof has more steps than the encoding allows.
    #[error("proof too deep: {0} steps")]
    TooDeep(usize),
}

/// Result alias for Merkle operations.
pub type MerkleResult<T> = Result<T, MerkleError>;

/// Errors from content hashing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("record serialization failed: {0}")]
    Serialization(String),
}

pub type HasherResult<T> = Result<T, HasherError>;

/// Errors from collective signing and verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CosiError {
    #[error("insufficient signers: {present} participating, at least {required} required")]
    InsufficientSigners { present: usize, required: usize },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidKey,

    #[error("signer is not in the authorized key list: {0}")]
    UnauthorizedSigner(String),

    #[error("too many authorized keys: {0} (at most 8)")]
    TooManyKeys(usize),

    #[error("signer {0} is not part of this session")]
    NotParticipating(usize),

    #[error("duplicate contribution from signer {0}")]
    DuplicateContribution(usize),

    #[error("session incomplete: {0}")]
    Incomplete(String),

    #[error("signing session timed out")]
    Timeout,

    #[error("malformed signature encoding: {0}")]
    Malformed(String),
}

/// Result alias for signing operations.
pub type CosiResult<T> = Result<T, CosiError>;
