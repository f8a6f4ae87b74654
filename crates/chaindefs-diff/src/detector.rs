//! Change detection between the last signed set and a candidate set.
//!
//! Records are matched on content hash first (every field except the
//! tombstone flag and the rank) and on primary key second. A content match
//! means "unchanged"; a key match means "modified"; an old record with
//! neither is carried forward as a tombstone.

use std::collections::{HashMap, HashSet};

use chaindefs_crypto::ContentHasher;
use chaindefs_types::{Definition, DefinitionKey, DefinitionKind, DefinitionSet, FieldChange, Record};

use crate::error::{DiffError, DiffResult};
use crate::policy::{ChangePolicy, ChangeRequest, ChangeResolver, Resolution};
use crate::render::render_change;

/// What happened to a modified record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Only unprotected fields changed; the new record stands.
    Informational,
    /// Protected fields changed and the change was approved.
    Accepted,
    /// Protected fields changed and the old record was restored.
    Rejected,
}

/// One modified record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordChange {
    pub kind: DefinitionKind,
    pub key: DefinitionKey,
    pub fields: Vec<FieldChange>,
    /// Rendered before/after diff.
    pub diff: String,
    /// Whether the change should be shown to an operator.
    pub visible: bool,
    pub outcome: Outcome,
}

impl RecordChange {
    pub fn is_protected(&self) -> bool {
        self.fields.iter().any(|f| f.protected)
    }

    pub fn name_changed(&self) -> bool {
        self.fields.iter().any(|f| f.field == "name")
    }
}

/// Summary of one reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub added: Vec<DefinitionKey>,
    pub modified: Vec<RecordChange>,
    /// Keys newly tombstoned in this run.
    pub deleted: Vec<DefinitionKey>,
    /// Old tombstones whose content reappeared live.
    pub resurrected: Vec<DefinitionKey>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.resurrected.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.count(Outcome::Rejected)
    }

    pub fn accepted(&self) -> usize {
        self.count(Outcome::Accepted)
    }

    /// Changes an operator should see.
    pub fn visible(&self) -> impl Iterator<Item = &RecordChange> {
        self.modified.iter().filter(|c| c.visible)
    }

    pub fn merge(&mut self, other: ChangeReport) {
        self.added.extend(other.added);
        self.modified.extend(other.modified);
        self.deleted.extend(other.deleted);
        self.resurrected.extend(other.resurrected);
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.modified.iter().filter(|c| c.outcome == outcome).count()
    }
}

/// Reconciled records plus the report describing how they were produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation<T> {
    pub records: T,
    pub report: ChangeReport,
}

/// Diffs old against new records and resolves protected changes.
///
/// ```ignore
/// let mut detector = ChangeDetector::new(ChangePolicy::RejectAll);
/// let result = detector.reconcile(&old.networks, new.networks)?;
/// ```
pub struct ChangeDetector<'a> {
    policy: ChangePolicy,
    resolver: Option<&'a mut dyn ChangeResolver>,
    checkpoint: Option<&'a mut dyn FnMut(&Definition)>,
    highlight: Option<HashSet<String>>,
    hasher: ContentHasher,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(policy: ChangePolicy) -> Self {
        Self {
            policy,
            resolver: None,
            checkpoint: None,
            highlight: None,
            hasher: ContentHasher::RECORD,
        }
    }

    /// Resolver consulted under [`ChangePolicy::Prompt`].
    pub fn with_resolver(mut self, resolver: &'a mut dyn ChangeResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Called with the restored record after every prompted rejection, so the
    /// caller can persist decisions before the session ends.
    pub fn with_checkpoint(mut self, checkpoint: &'a mut dyn FnMut(&Definition)) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Restrict visibility of plain modifications to records whose external
    /// id is in `ids`. Name and protected changes are always visible.
    pub fn with_highlight(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.highlight = Some(ids.into_iter().collect());
        self
    }

    /// Reconcile all three record lists of a batch.
    pub fn reconcile_set(
        &mut self,
        old: &DefinitionSet,
        new: DefinitionSet,
    ) -> DiffResult<Reconciliation<DefinitionSet>> {
        let networks = self.reconcile(&old.networks, new.networks)?;
        let tokens = self.reconcile(&old.tokens, new.tokens)?;
        let solana = self.reconcile(&old.solana_tokens, new.solana_tokens)?;

        let mut report = networks.report;
        report.merge(tokens.report);
        report.merge(solana.report);
        Ok(Reconciliation {
            records: DefinitionSet {
                networks: networks.records,
                tokens: tokens.records,
                solana_tokens: solana.records,
            },
            report,
        })
    }

    /// Reconcile one record list. `new` is consumed and returned, possibly
    /// with reverted records and appended tombstones.
    pub fn reconcile<R: Record>(
        &mut self,
        old: &[R],
        mut new: Vec<R>,
    ) -> DiffResult<Reconciliation<Vec<R>>> {
        if self.policy == ChangePolicy::Prompt && self.resolver.is_none() {
            return Err(DiffError::NoResolver);
        }
        let old_keys: HashSet<DefinitionKey> = unique_keys(old, "old")?.into_iter().collect();
        let new_index: HashMap<DefinitionKey, usize> = unique_keys(&new, "new")?
            .into_iter()
            .enumerate()
            .map(|(i, key)| (key, i))
            .collect();

        // content hash -> whether some new record with that content is live
        let mut new_hashes: HashMap<_, bool> = HashMap::with_capacity(new.len());
        for record in &new {
            let live = new_hashes
                .entry(self.hasher.record_digest(record)?)
                .or_insert(false);
            *live |= !record.is_deleted();
        }

        let mut report = ChangeReport {
            added: new_index
                .keys()
                .filter(|k| !old_keys.contains(k))
                .cloned()
                .collect(),
            ..Default::default()
        };
        report.added.sort();

        let mut tombstones = Vec::new();
        for old_record in old {
            let key = old_record.key();
            if let Some(&new_live) = new_hashes.get(&self.hasher.record_digest(old_record)?) {
                if old_record.is_deleted() && new_live {
                    tracing::info!(key = %key, "tombstoned definition reappeared unchanged");
                    report.resurrected.push(key);
                }
                continue;
            }
            match new_index.get(&key) {
                Some(&index) => {
                    let change = self.resolve_modification(old_record, &mut new[index])?;
                    report.modified.push(change);
                }
                None => {
                    let mut tombstone = old_record.clone();
                    if !tombstone.is_deleted() {
                        tracing::debug!(key = %key, "definition deleted");
                        report.deleted.push(key);
                        tombstone.set_deleted(true);
                    }
                    tombstones.push(tombstone);
                }
            }
        }
        new.extend(tombstones);

        Ok(Reconciliation {
            records: new,
            report,
        })
    }

    fn resolve_modification<R: Record>(&mut self, old: &R, new: &mut R) -> DiffResult<RecordChange> {
        let key = old.key();
        let fields = old.field_changes(new);
        let diff = render_change(old, new)?;
        let name_changed = fields.iter().any(|f| f.field == "name");
        let protected = fields.iter().any(|f| f.protected);

        if name_changed {
            tracing::warn!(key = %key, old = old.name(), new = new.name(), "name change in definition");
        }
        let mut outcome = Outcome::Informational;
        if protected {
            tracing::error!(
                key = %key,
                old_symbol = old.symbol(),
                new_symbol = new.symbol(),
                "symbol/decimals change in definition"
            );
            let resolution = match (self.policy, self.resolver.as_deref_mut()) {
                (ChangePolicy::AcceptAll, _) => Resolution::Accept,
                (ChangePolicy::Prompt, Some(resolver)) => resolver.resolve(&ChangeRequest {
                    kind: old.kind(),
                    key: &key,
                    fields: &fields,
                    diff: &diff,
                }),
                _ => Resolution::Reject,
            };
            outcome = match resolution {
                Resolution::Accept => Outcome::Accepted,
                Resolution::Reject => {
                    tracing::info!(key = %key, "definition change rejected");
                    *new = old.clone();
                    if self.policy == ChangePolicy::Prompt {
                        if let Some(checkpoint) = self.checkpoint.as_deref_mut() {
                            checkpoint(&old.clone().into_definition());
                        }
                    }
                    Outcome::Rejected
                }
            };
        }

        let visible = name_changed || protected || self.highlighted(old, new);
        Ok(RecordChange {
            kind: old.kind(),
            key,
            fields,
            diff,
            visible,
            outcome,
        })
    }

    fn highlighted<R: Record>(&self, old: &R, new: &R) -> bool {
        match &self.highlight {
            None => true,
            Some(ids) => [old.external_id(), new.external_id()]
                .into_iter()
                .flatten()
                .any(|id| ids.contains(id)),
        }
    }
}

fn unique_keys<R: Record>(records: &[R], side: &'static str) -> DiffResult<Vec<DefinitionKey>> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut keys = Vec::with_capacity(records.len());
    for record in records {
        let key = record.key();
        if !seen.insert(key.clone()) {
            return Err(DiffError::DuplicateKey { side, key });
        }
        keys.push(key);
    }
    Ok(keys)
}
