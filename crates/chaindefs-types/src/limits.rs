//! Size and encoding constants shared with constrained verifiers.

/// Format magic at the start of every serialized definition.
pub const FORMAT_MAGIC: &[u8; 5] = b"trzd1";

/// Maximum length of `name` and `symbol`, in bytes.
pub const MAX_STRING_LEN: usize = 256;

/// Length of a raw EVM address.
pub const EVM_ADDRESS_LEN: usize = 20;

/// Length of a raw Solana mint key.
pub const SOLANA_MINT_LEN: usize = 32;

/// Largest artifact a device will accept.
pub const MAX_ARTIFACT_LEN: usize = 1024;

/// Minimum number of participating signers.
pub const MIN_SIGNERS: usize = 2;

/// Truncate `s` to at most `max` bytes without splitting a UTF-8 sequence.
///
/// Returns `None` when no truncation was necessary.
pub fn truncate_utf8(s: &str, max: usize) -> Option<String> {
    if s.len() <= max {
        return None;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    Some(s[..end].to_string())
}
