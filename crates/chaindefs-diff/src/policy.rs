use chaindefs_types::{DefinitionKey, DefinitionKind, FieldChange};

use crate::error::{DiffError, DiffResult};

/// How protected (symbol / decimals) changes are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChangePolicy {
    /// Revert every protected change to the old record.
    #[default]
    RejectAll,
    /// Let every protected change through.
    AcceptAll,
    /// Ask a [`ChangeResolver`] per record.
    Prompt,
}

impl ChangePolicy {
    pub fn from_flags(interactive: bool, force_accept: bool) -> DiffResult<Self> {
        match (interactive, force_accept) {
            (true, true) => Err(DiffError::ConflictingFlags),
            (true, false) => Ok(Self::Prompt),
            (false, true) => Ok(Self::AcceptAll),
            (false, false) => Ok(Self::RejectAll),
        }
    }
}

/// Decision for one protected change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Accept,
    Reject,
}

/// A protected change awaiting a decision.
#[derive(Debug)]
pub struct ChangeRequest<'a> {
    pub kind: DefinitionKind,
    pub key: &'a DefinitionKey,
    pub fields: &'a [FieldChange],
    /// Line diff of the old and new record, see [`crate::render_change`].
    pub diff: &'a str,
}

/// Decides protected changes under [`ChangePolicy::Prompt`].
///
/// A terminal prompt is one implementation; any closure with the right
/// signature is another.
pub trait ChangeResolver {
    fn resolve(&mut self, request: &ChangeRequest<'_>) -> Resolution;
}

impl<F> ChangeResolver for F
where
    F: FnMut(&ChangeRequest<'_>) -> Resolution,
{
    fn resolve(&mut self, request: &ChangeRequest<'_>) -> Resolution {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_from_flags() {
        assert_eq!(ChangePolicy::from_flags(false, false), Ok(ChangePolicy::RejectAll));
        assert_eq!(ChangePolicy::from_flags(false, true), Ok(ChangePolicy::AcceptAll));
        assert_eq!(ChangePolicy::from_flags(true, false), Ok(ChangePolicy::Prompt));
        assert_eq!(
            ChangePolicy::from_flags(true, true),
            Err(DiffError::ConflictingFlags)
        );
    }
}
