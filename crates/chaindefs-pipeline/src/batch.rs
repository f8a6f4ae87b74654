use std::path::Path;
use std::time::Instant;

use chaindefs_codec::{serialize, CodecError};
use chaindefs_crypto::{
    cosi, sign_with_dev_keys, sign_with_keys_until, CosiSignature, MerkleTree, SigningKey,
};
use chaindefs_diff::{ChangeDetector, ChangeReport};
use chaindefs_pack::{Artifact, ArtifactWriter, PackResult, WriteReport};
use chaindefs_types::{
    Definition, DefinitionKey, DefinitionSet, DefinitionsFile, Digest, Metadata, Record,
};
use chrono::{DateTime, Utc};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::assemble::{enforce_limits, merge_sources, pin_restored, LimitReport};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Where [`Pipeline::generate`] takes its signature from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureSource {
    /// Sign the recomputed root with the development keys.
    Dev,
    /// Use the signature stored in the file's metadata.
    Stored,
}

/// Result of [`Pipeline::reconcile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciled {
    pub definitions: DefinitionSet,
    pub limits: LimitReport,
    pub changes: ChangeReport,
    /// Keys held at an earlier session's rejection.
    pub pinned: Vec<DefinitionKey>,
}

/// Serialized live records of one batch, in set order.
#[derive(Clone, Debug)]
pub struct SerializedBatch {
    pub timestamp: u64,
    pub entries: Vec<(Definition, Vec<u8>)>,
    /// Records that failed to encode and were left out.
    pub dropped: Vec<CodecError>,
}

impl SerializedBatch {
    pub fn tree(&self) -> MerkleTree {
        MerkleTree::build(self.entries.iter().map(|(_, payload)| payload))
    }
}

#[derive(Debug)]
pub struct GenerateReport {
    pub root: Digest,
    pub signature: CosiSignature,
    pub encoding_errors: usize,
    pub write: WriteReport,
}

/// Batch pipeline over one [`PipelineConfig`].
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ---- Reconcile ----

    /// Merge candidate sources, enforce field limits, and diff the result
    /// against the previously signed set.
    ///
    /// The returned set is sorted canonically and carries tombstones for
    /// every record that disappeared.
    pub fn reconcile(
        &self,
        previous: &DefinitionSet,
        candidates: Vec<DefinitionSet>,
        detector: &mut ChangeDetector<'_>,
    ) -> PipelineResult<Reconciled> {
        self.resume_reconcile(previous, candidates, Vec::new(), detector)
    }

    /// [`Pipeline::reconcile`] continuing an interrupted session: records in
    /// `restored` (see [`crate::load_rejections`]) override their candidates
    /// before diffing.
    pub fn resume_reconcile(
        &self,
        previous: &DefinitionSet,
        candidates: Vec<DefinitionSet>,
        restored: Vec<Definition>,
        detector: &mut ChangeDetector<'_>,
    ) -> PipelineResult<Reconciled> {
        let mut assembled = merge_sources(candidates);
        let pinned = pin_restored(&mut assembled, previous, restored);
        let limits = enforce_limits(&mut assembled);
        assembled.ensure_unique_keys()?;

        let result = detector.reconcile_set(previous, assembled)?;
        let mut definitions = result.records;
        definitions.sort();

        let changes = result.report;
        tracing::info!(
            added = changes.added.len(),
            modified = changes.modified.len(),
            deleted = changes.deleted.len(),
            resurrected = changes.resurrected.len(),
            rejected = changes.rejected(),
            pinned = pinned.len(),
            "reconciled definitions"
        );
        Ok(Reconciled {
            definitions,
            limits,
            changes,
            pinned,
        })
    }

    // ---- Commit ----

    /// Serialize every live record with the batch timestamp.
    ///
    /// Tombstones are not serialized. Records that fail to encode are logged
    /// and left out of the batch.
    pub fn serialize_batch(&self, set: &DefinitionSet, timestamp: u64) -> SerializedBatch {
        let live: Vec<Definition> = set.definitions().filter(|d| !d.is_deleted()).collect();
        let encoded = self.map_records(&live, |definition| serialize(definition, timestamp));

        let mut entries = Vec::with_capacity(live.len());
        let mut dropped = Vec::new();
        for (definition, result) in live.into_iter().zip(encoded) {
            match result {
                Ok(payload) => entries.push((definition, payload)),
                Err(e) => {
                    tracing::warn!(key = %definition.key(), error = %e, "dropping record that cannot be encoded");
                    dropped.push(e);
                }
            }
        }
        SerializedBatch {
            timestamp,
            entries,
            dropped,
        }
    }

    /// Merkle root of the file's records at its stored timestamp.
    pub fn compute_root(&self, file: &DefinitionsFile) -> Digest {
        self.serialize_batch(&file.definitions, file.metadata.unix_timestamp)
            .tree()
            .root()
    }

    /// Freeze a reconciled set into a new, unsigned definitions file.
    pub fn commit(
        &self,
        definitions: DefinitionSet,
        now: DateTime<Utc>,
        commit_hash: Option<String>,
    ) -> PipelineResult<DefinitionsFile> {
        let timestamp = u32::try_from(now.timestamp())
            .map_err(|_| PipelineError::Timestamp(now.timestamp()))?;
        let batch = self.serialize_batch(&definitions, u64::from(timestamp));
        let root = batch.tree().root();
        tracing::info!(
            root = %root,
            leaves = batch.entries.len(),
            dropped = batch.dropped.len(),
            "committed definitions"
        );
        Ok(DefinitionsFile {
            definitions,
            metadata: Metadata {
                datetime: now.to_rfc3339(),
                unix_timestamp: batch.timestamp,
                merkle_root: root,
                commit_hash,
                signature: None,
            },
        })
    }

    // ---- Sign ----

    /// Recompute the root of `file` and require it to match the stored one.
    pub fn check_root(&self, file: &DefinitionsFile) -> PipelineResult<Digest> {
        let computed = self.compute_root(file);
        let stored = file.metadata.merkle_root;
        if computed != stored {
            tracing::error!(%stored, %computed, "merkle root mismatch");
            return Err(PipelineError::RootMismatch { stored, computed });
        }
        Ok(computed)
    }

    /// Sign the stored root with local keys and store the signature.
    ///
    /// The root is recomputed first; a stale file is never signed. With `dev`
    /// the keys are checked against the development key list, otherwise
    /// against the configured one.
    pub fn sign(
        &self,
        file: &mut DefinitionsFile,
        keys: &[SigningKey],
        dev: bool,
    ) -> PipelineResult<CosiSignature> {
        let root = self.check_root(file)?;
        let authorized = self.config.authorized(dev)?;
        let deadline = Instant::now() + self.config.signing_timeout();
        let signature = sign_with_keys_until(root.as_bytes(), keys, &authorized, Some(deadline))?;
        file.metadata.signature = Some(signature.to_hex());
        tracing::info!(root = %root, signers = %signature.mask, "signed definitions");
        Ok(signature)
    }

    /// Verify an externally produced signature over the stored root and
    /// store it. With `recompute` the root is re-derived from the records
    /// first and must match.
    pub fn attach_signature(
        &self,
        file: &mut DefinitionsFile,
        signature_hex: &str,
        recompute: bool,
        dev: bool,
    ) -> PipelineResult<CosiSignature> {
        let root = if recompute {
            self.check_root(file)?
        } else {
            file.metadata.merkle_root
        };
        let signature = CosiSignature::from_hex(signature_hex)?;
        cosi::verify(&signature, root.as_bytes(), &self.config.authorized(dev)?)?;
        file.metadata.signature = Some(signature.to_hex());
        tracing::info!(root = %root, signers = %signature.mask, "attached signature");
        Ok(signature)
    }

    // ---- Generate ----

    /// Write one artifact per live record into `output_dir`.
    ///
    /// The root is recomputed and compared with the metadata, and the
    /// signature is verified, before anything touches the filesystem.
    /// Oversized artifacts and path conflicts are reported per record.
    pub fn generate(
        &self,
        file: &DefinitionsFile,
        source: SignatureSource,
        output_dir: &Path,
    ) -> PipelineResult<GenerateReport> {
        let batch = self.serialize_batch(&file.definitions, file.metadata.unix_timestamp);
        let tree = batch.tree();
        let root = tree.root();
        if root != file.metadata.merkle_root {
            tracing::error!(stored = %file.metadata.merkle_root, computed = %root, "merkle root mismatch");
            return Err(PipelineError::RootMismatch {
                stored: file.metadata.merkle_root,
                computed: root,
            });
        }

        let dev = source == SignatureSource::Dev;
        let signature = match source {
            SignatureSource::Dev => sign_with_dev_keys(root.as_bytes())?,
            SignatureSource::Stored => {
                let hex = file
                    .metadata
                    .signature
                    .as_deref()
                    .ok_or(PipelineError::NoSignature)?;
                CosiSignature::from_hex(hex)?
            }
        };
        cosi::verify(&signature, root.as_bytes(), &self.config.authorized(dev)?)?;

        let artifacts = self
            .map_records(&batch.entries, |(_, payload)| -> PackResult<Vec<u8>> {
                Artifact::new(payload.clone(), tree.proof(payload)?, signature).to_bytes()
            })
            .into_iter()
            .collect::<PackResult<Vec<_>>>()?;

        self.prepare_output(output_dir)?;
        let mut writer = ArtifactWriter::new(output_dir).with_max_len(self.config.max_artifact_len);
        for ((definition, _), artifact) in batch.entries.iter().zip(&artifacts) {
            writer.emit(definition, artifact)?;
        }
        let write = writer.finish();
        tracing::info!(
            root = %root,
            written = write.written.len(),
            oversized = write.oversized(),
            conflicts = write.conflicts(),
            "generated artifacts"
        );
        Ok(GenerateReport {
            root,
            signature,
            encoding_errors: batch.dropped.len(),
            write,
        })
    }

    fn prepare_output(&self, dir: &Path) -> PipelineResult<()> {
        if dir.exists() && std::fs::read_dir(dir)?.next().is_some() {
            if !self.config.clean_output {
                return Err(PipelineError::OutputNotEmpty(dir.to_path_buf()));
            }
            tracing::info!(path = %dir.display(), "removing previous output");
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;
        Ok(())
    }

    /// Check a single artifact against the authorized keys. Returns the root
    /// it commits to and the record it carries.
    pub fn verify_artifact(&self, data: &[u8], dev: bool) -> PipelineResult<(Digest, Definition)> {
        let artifact = Artifact::parse(data)?;
        let root = artifact.verify(&self.config.authorized(dev)?)?;
        Ok((root, artifact.definition()?))
    }

    #[cfg(feature = "parallel")]
    fn map_records<T, U, F>(&self, items: &[T], f: F) -> Vec<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        if self.config.parallel {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn map_records<T, U, F>(&self, items: &[T], f: F) -> Vec<U>
    where
        F: Fn(&T) -> U,
    {
        items.iter().map(f).collect()
    }
}
