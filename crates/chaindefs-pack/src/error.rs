use std::path::PathBuf;

use chaindefs_codec::CodecError;
use chaindefs_crypto::{CosiError, MerkleError};
use chaindefs_types::{DefinitionKey, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    /// The artifact exceeds the device limit; the record is skipped.
    #[error("artifact for {key} is {size} bytes (max {max})")]
    Oversized {
        key: DefinitionKey,
        size: usize,
        max: usize,
    },

    /// The target path already exists and may not be reused.
    #[error("{0} already exists, not overwritten")]
    PathConflict(PathBuf),

    #[error("malformed artifact: {0}")]
    Malformed(String),

    #[error("invalid record: {0}")]
    Type(#[from] TypeError),

    #[error("payload error: {0}")]
    Codec(#[from] CodecError),

    #[error("proof error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("signature error: {0}")]
    Cosi(#[from] CosiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PackResult<T> = Result<T, PackError>;
