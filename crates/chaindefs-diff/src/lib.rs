//! Change detection for chain definitions.
//!
//! Compares the last signed record set against a freshly assembled one,
//! classifies every difference, and resolves protected changes through a
//! pluggable policy before anything is serialized.
//!
//! # Key Types
//!
//! - [`ChangeDetector`] -- Consumes old/new record lists, returns a [`Reconciliation`]
//! - [`ChangePolicy`] / [`ChangeResolver`] -- How protected changes are decided
//! - [`ChangeReport`] / [`RecordChange`] -- What changed, and what was done about it
//! - [`BuiltinReport`] -- Drift between firmware built-ins and the current set

pub mod builtin;
pub mod detector;
pub mod error;
pub mod policy;
pub mod render;

pub use builtin::{check_builtin, BuiltinReport};
pub use detector::{ChangeDetector, ChangeReport, Outcome, Reconciliation, RecordChange};
pub use error::{DiffError, DiffResult};
pub use policy::{ChangePolicy, ChangeRequest, ChangeResolver, Resolution};
pub use render::render_change;
