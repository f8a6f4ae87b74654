use chaindefs_types::DefinitionKey;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A record field cannot be encoded; the record is dropped from the batch.
    #[error("cannot encode {key}: field `{field}`: {reason}")]
    Encoding {
        key: DefinitionKey,
        field: &'static str,
        reason: String,
    },

    #[error("unexpected end of input: {0}")]
    Truncated(&'static str),

    #[error("bad format magic")]
    BadMagic,

    #[error("unknown definition type: {0}")]
    UnknownType(u8),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
