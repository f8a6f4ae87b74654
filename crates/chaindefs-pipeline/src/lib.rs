//! Batch pipeline for chain definitions.
//!
//! Ties the record model, change detector, serializer, Merkle builder,
//! collective signer and artifact writer into the four batch steps:
//!
//! 1. **reconcile**: merge candidate sources, enforce field limits, and diff
//!    against the last signed set
//! 2. **commit**: serialize the reconciled set and record the Merkle root
//! 3. **sign**: attach and verify a collective signature over the root
//! 4. **generate**: re-derive the root, verify the signature, write artifacts
//!
//! All per-run context lives in [`PipelineConfig`]; there is no global state.

pub mod assemble;
pub mod batch;
pub mod config;
pub mod error;
pub mod store;

pub use assemble::{enforce_limits, merge_sources, pin_restored, LimitReport};
pub use batch::{GenerateReport, Pipeline, Reconciled, SerializedBatch, SignatureSource};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use store::{
    append_rejection, clear_rejections, load_candidates, load_definitions, load_rejections,
    rejection_journal, store_definitions,
};
