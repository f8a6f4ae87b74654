//! Foundation types for chain definitions.
//!
//! This crate provides the canonical record model shared by every other
//! `chaindefs` crate: the three definition kinds, their primary keys, the
//! 32-byte [`Digest`] used for Merkle roots, and the on-disk definitions file.
//!
//! # Key Types
//!
//! - [`Network`], [`Token`], [`SolanaToken`]: Typed definition records
//! - [`Definition`]: Tagged union over the three record kinds
//! - [`DefinitionKey`]: Primary key of a record
//! - [`Record`]: Behaviour shared by every record kind
//! - [`DefinitionSet`]: The three record lists of one batch
//! - [`DefinitionsFile`] / [`Metadata`]: Signed definitions file format
//! - [`Digest`]: 32-byte hash value

pub mod address;
pub mod digest;
pub mod error;
pub mod file;
pub mod limits;
pub mod record;
pub mod set;

pub use address::{EvmAddress, SolanaMint};
pub use digest::Digest;
pub use error::{TypeError, TypeResult};
pub use file::{DefinitionsFile, Metadata};
pub use record::{
    Definition, DefinitionKey, DefinitionKind, FieldChange, Network, Record, SolanaToken, Token,
};
pub use set::DefinitionSet;
