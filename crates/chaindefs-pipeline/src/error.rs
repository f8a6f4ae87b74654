use std::path::PathBuf;

use chaindefs_types::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The root recomputed from the records differs from the stored one.
    #[error("computed Merkle root {computed} does not match stored root {stored}")]
    RootMismatch { stored: Digest, computed: Digest },

    #[error("no signature available: sign with development keys or store a signature first")]
    NoSignature,

    #[error("output directory {0} is not empty")]
    OutputNotEmpty(PathBuf),

    #[error("timestamp {0} does not fit the payload header")]
    Timestamp(i64),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record error: {0}")]
    Type(#[from] chaindefs_types::TypeError),

    #[error("change detection error: {0}")]
    Diff(#[from] chaindefs_diff::DiffError),

    #[error("serialization error: {0}")]
    Codec(#[from] chaindefs_codec::CodecError),

    #[error("merkle error: {0}")]
    Merkle(#[from] chaindefs_crypto::MerkleError),

    #[error("signature error: {0}")]
    Cosi(#[from] chaindefs_crypto::CosiError),

    #[error("artifact error: {0}")]
    Pack(#[from] chaindefs_pack::PackError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
