use std::path::{Path, PathBuf};

use chaindefs_types::limits::MAX_ARTIFACT_LEN;
use chaindefs_types::{Definition, Record};

use crate::error::{PackError, PackResult};
use crate::path::OutputPath;

/// Outcome of a batch of writes.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    /// Existing files at `exists_ok` locations, left as they were.
    pub kept_existing: Vec<PathBuf>,
    /// Per-record omissions: oversized artifacts and path conflicts.
    pub skipped: Vec<PackError>,
}

impl WriteReport {
    pub fn oversized(&self) -> usize {
        self.skipped
            .iter()
            .filter(|e| matches!(e, PackError::Oversized { .. }))
            .count()
    }

    pub fn conflicts(&self) -> usize {
        self.skipped
            .iter()
            .filter(|e| matches!(e, PackError::PathConflict(_)))
            .count()
    }
}

/// Writes artifacts into the output tree.
pub struct ArtifactWriter {
    root: PathBuf,
    max_len: usize,
    report: WriteReport,
}

impl ArtifactWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            max_len: MAX_ARTIFACT_LEN,
            report: WriteReport::default(),
        }
    }

    /// Override the artifact size ceiling.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one record's artifact to each of its locations.
    ///
    /// Oversized artifacts and conflicting paths are logged and recorded in
    /// the report; only I/O failures and unroutable records are errors.
    pub fn emit(&mut self, definition: &Definition, artifact: &[u8]) -> PackResult<()> {
        let key = definition.key();
        if artifact.len() > self.max_len {
            tracing::warn!(key = %key, size = artifact.len(), max = self.max_len, "artifact too large, skipping");
            self.report.skipped.push(PackError::Oversized {
                key,
                size: artifact.len(),
                max: self.max_len,
            });
            return Ok(());
        }

        for location in OutputPath::for_definition(definition)? {
            let path = location.resolve(&self.root);
            if path.exists() {
                if location.exists_ok {
                    tracing::info!(path = %path.display(), "skipping existing file");
                    self.report.kept_existing.push(path);
                } else {
                    tracing::error!(path = %path.display(), "file already exists, not overwriting");
                    self.report.skipped.push(PackError::PathConflict(path));
                }
                continue;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::debug!(path = %path.display(), "writing artifact");
            std::fs::write(&path, artifact)?;
            self.report.written.push(path);
        }
        Ok(())
    }

    pub fn finish(self) -> WriteReport {
        self.report
    }
}
