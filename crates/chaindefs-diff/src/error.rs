//! Error types for the diff crate.

use chaindefs_crypto::HasherError;
use chaindefs_types::DefinitionKey;

/// Errors that can occur during change detection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiffError {
    /// The same primary key appears twice in one record list.
    #[error("duplicate key in {side} set: {key}")]
    DuplicateKey { side: &'static str, key: DefinitionKey },

    /// The prompt policy was selected without a resolver to ask.
    #[error("prompt policy requires a change resolver")]
    NoResolver,

    #[error("cannot be both interactive and force-accept")]
    ConflictingFlags,

    #[error("hashing failed: {0}")]
    Hash(#[from] HasherError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
