//! Per-record distribution artifacts.
//!
//! An artifact is one record's serialized payload, its Merkle inclusion
//! proof, and the batch signature over the root:
//!
//! ```text
//! payload | proof (count u8, siblings, side bits) | signature (mask u8, R, S)
//! ```
//!
//! Given only the authorized key list, a verifier can recompute the root
//! from the payload and proof and check the signature against it.
//!
//! # Architecture
//!
//! - **Artifact**: building, parsing and verifying one artifact
//! - **OutputPath**: lookup-oriented layout of the output tree
//! - **ArtifactWriter**: size guard and conflict handling on write

pub mod artifact;
pub mod error;
pub mod path;
pub mod writer;

pub use artifact::Artifact;
pub use error::{PackError, PackResult};
pub use path::OutputPath;
pub use writer::{ArtifactWriter, WriteReport};
