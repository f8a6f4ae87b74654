use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chaindefs_types::{Definition, DefinitionSet, DefinitionsFile, Network, SolanaToken, Token};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

fn read(path: &Path) -> PipelineResult<String> {
    std::fs::read_to_string(path).map_err(|source| PipelineError::File {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a signed definitions file.
pub fn load_definitions(path: &Path) -> PipelineResult<DefinitionsFile> {
    let file = DefinitionsFile::from_json(&read(path)?)?;
    tracing::debug!(
        path = %path.display(),
        records = file.definitions.len(),
        root = %file.metadata.merkle_root.short_hex(),
        "loaded definitions"
    );
    Ok(file)
}

/// Write a definitions file as pretty JSON, replacing any existing file.
///
/// The content goes to a sibling temporary file first and is renamed into
/// place, so an interrupted write leaves the old file intact.
pub fn store_definitions(path: &Path, file: &DefinitionsFile) -> PipelineResult<()> {
    let json = file.to_json_pretty()?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|source| PipelineError::File {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| PipelineError::File {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "stored definitions");
    Ok(())
}

/// Load a candidate record set: a JSON object with any of the three record
/// lists. Metadata, if present, is ignored.
pub fn load_candidates(path: &Path) -> PipelineResult<DefinitionSet> {
    serde_json::from_str(&read(path)?)
        .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))
}

// ---- Rejection journal ----

/// One line of the rejection journal. Tagged, because the three record
/// shapes overlap too much to tell apart untagged.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JournalEntry {
    Network(Network),
    Token(Token),
    SolanaToken(SolanaToken),
}

impl From<Definition> for JournalEntry {
    fn from(definition: Definition) -> Self {
        match definition {
            Definition::Network(r) => Self::Network(r),
            Definition::Token(r) => Self::Token(r),
            Definition::SolanaToken(r) => Self::SolanaToken(r),
        }
    }
}

impl From<JournalEntry> for Definition {
    fn from(entry: JournalEntry) -> Self {
        match entry {
            JournalEntry::Network(r) => Self::Network(r),
            JournalEntry::Token(r) => Self::Token(r),
            JournalEntry::SolanaToken(r) => Self::SolanaToken(r),
        }
    }
}

/// Journal of prompted rejections kept next to a definitions file.
pub fn rejection_journal(definitions: &Path) -> PathBuf {
    definitions.with_extension("rejected.jsonl")
}

/// Append a restored record to the journal, one JSON object per line.
pub fn append_rejection(journal: &Path, definition: &Definition) -> PipelineResult<()> {
    let line = serde_json::to_string(&JournalEntry::from(definition.clone()))
        .map_err(|e| PipelineError::Config(format!("{}: {e}", journal.display())))?;
    let file_error = |source| PipelineError::File {
        path: journal.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(journal)
        .map_err(file_error)?;
    writeln!(file, "{line}").map_err(file_error)?;
    file.sync_data().map_err(file_error)?;
    Ok(())
}

/// Records restored by an earlier, unfinished session. A missing journal is
/// empty. A torn last line from an interrupted append is skipped.
pub fn load_rejections(journal: &Path) -> PipelineResult<Vec<Definition>> {
    if !journal.exists() {
        return Ok(Vec::new());
    }
    let text = read(journal)?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut restored = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => restored.push(Definition::from(entry)),
            Err(e) if i + 1 == lines.len() && !text.ends_with('\n') => {
                tracing::warn!(path = %journal.display(), error = %e, "skipping torn journal line");
            }
            Err(e) => {
                return Err(PipelineError::Config(format!(
                    "{} line {}: {e}",
                    journal.display(),
                    i + 1
                )))
            }
        }
    }
    tracing::debug!(path = %journal.display(), records = restored.len(), "loaded rejection journal");
    Ok(restored)
}

/// Remove the journal once its decisions are in a stored definitions file.
pub fn clear_rejections(journal: &Path) -> PipelineResult<()> {
    match std::fs::remove_file(journal) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PipelineError::File {
            path: journal.to_path_buf(),
            source,
        }),
    }
}
