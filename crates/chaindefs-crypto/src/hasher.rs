use chaindefs_types::{Digest, Record};
use serde::Serialize;

use crate::error::{HasherError, HasherResult};

/// BLAKE3 digests of record content for change detection.
///
/// Each hasher derives its key from a context string, so the record digest
/// and the built-in digest of the same record never coincide.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    context: &'static str,
}

impl ContentHasher {
    pub const RECORD: Self = Self {
        context: "chaindefs 2024 record content v1",
    };
    pub const BUILTIN: Self = Self {
        context: "chaindefs 2024 builtin content v1",
    };

    fn digest_json<T: Serialize>(&self, value: &T) -> HasherResult<Digest> {
        let mut hasher = blake3::Hasher::new_derive_key(self.context);
        serde_json::to_writer(&mut hasher, value)
            .map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(Digest::from_hash(*hasher.finalize().as_bytes()))
    }

    /// Digest of every field except the tombstone flag and the volatile rank.
    ///
    /// Struct fields serialize in declaration order, so equal records always
    /// digest equally.
    pub fn record_digest<R: Record>(&self, record: &R) -> HasherResult<Digest> {
        self.digest_json(&record.content_view())
    }

    /// Digest ignoring the tombstone flag, the rank and the external id.
    pub fn builtin_digest<R: Record>(&self, record: &R) -> HasherResult<Digest> {
        self.digest_json(&record.builtin_view())
    }
}
