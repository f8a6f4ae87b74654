//! Deterministic binary encoding of definition records.
//!
//! Every record serializes to a fixed header followed by a protobuf-compatible
//! field encoding:
//!
//! ```text
//! magic "trzd1" (5) | type (1) | timestamp u32 LE (4) | data_len u16 LE (2) | data
//! ```
//!
//! Identical field values always produce identical bytes; the serialized
//! payloads are the leaves of the batch Merkle tree.

pub mod error;
pub mod payload;
pub mod serializer;
pub mod wire;

pub use error::{CodecError, CodecResult};
pub use payload::{PayloadHeader, HEADER_LEN};
pub use serializer::{deserialize, serialize};
