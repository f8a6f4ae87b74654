use thiserror::Error;

use crate::record::DefinitionKey;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid EVM address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid Solana mint {mint:?}: {reason}")]
    InvalidMint { mint: String, reason: String },

    #[error("duplicate primary key: {0}")]
    DuplicateKey(DefinitionKey),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
