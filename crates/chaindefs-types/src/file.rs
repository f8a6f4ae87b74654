use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{TypeError, TypeResult};
use crate::set::DefinitionSet;

/// Batch metadata stored alongside the records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Human-readable signing time (RFC 3339).
    pub datetime: String,
    /// Signing time in Unix seconds, shared by every serialized record.
    pub unix_timestamp: u64,
    /// Merkle root over every serialized record of the batch.
    pub merkle_root: Digest,
    /// Source revision the batch was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Hex-encoded collective signature over `merkle_root`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// The signed definitions file: metadata plus the three record lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionsFile {
    #[serde(flatten)]
    pub definitions: DefinitionSet,
    pub metadata: Metadata,
}

impl DefinitionsFile {
    pub fn from_json(data: &str) -> TypeResult<Self> {
        serde_json::from_str(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> TypeResult<String> {
        let mut out =
            serde_json::to_string_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }
}
