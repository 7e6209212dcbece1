use crate::engine::{apply_edits_with_report, OperationOutcome, PatchError, PatchOperation};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single file loaded for patching.
///
/// Content is read once, run through any number of operation lists in
/// memory, then written back once by [`FileEdit::commit`]. A failing
/// operation leaves the file on disk untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileEdit does nothing until commit() is called"]
pub struct FileEdit {
    /// Path of the file being edited
    pub file: PathBuf,
    original: String,
    content: String,
    outcomes: Vec<OperationOutcome>,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {file}: {source}")]
    Write {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file} is not valid UTF-8")]
    NotUtf8 { file: PathBuf },

    #[error("failed to patch {file}: {source}")]
    Patch {
        file: PathBuf,
        #[source]
        source: PatchError,
    },
}

/// Result of committing an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for applied/unchanged"]
pub enum EditResult {
    /// New content was written
    Applied { file: PathBuf, bytes_written: usize },
    /// Operations produced the content already on disk; nothing was written
    Unchanged { file: PathBuf },
}

impl FileEdit {
    /// Read `file` from disk.
    pub fn load(file: impl Into<PathBuf>) -> Result<Self, EditError> {
        let file = file.into();
        let bytes = fs::read(&file).map_err(|source| EditError::Read {
            file: file.clone(),
            source,
        })?;
        let content =
            String::from_utf8(bytes).map_err(|_| EditError::NotUtf8 { file: file.clone() })?;
        Ok(Self::from_content(file, content))
    }

    /// Start an edit from content already in memory.
    pub fn from_content(file: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            file: file.into(),
            original: content.clone(),
            content,
            outcomes: Vec::new(),
        }
    }

    /// Run `operations` over the current in-memory content.
    pub fn apply(&mut self, operations: &[PatchOperation]) -> Result<(), EditError> {
        let report =
            apply_edits_with_report(&self.content, operations).map_err(|source| {
                EditError::Patch {
                    file: self.file.clone(),
                    source,
                }
            })?;
        self.content = report.content;
        self.outcomes.extend(report.outcomes);
        Ok(())
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn outcomes(&self) -> &[OperationOutcome] {
        &self.outcomes
    }

    pub fn is_changed(&self) -> bool {
        self.original != self.content
    }

    /// Write the content back if it changed.
    pub fn commit(&self) -> Result<EditResult, EditError> {
        if !self.is_changed() {
            return Ok(EditResult::Unchanged {
                file: self.file.clone(),
            });
        }

        atomic_write(&self.file, self.content.as_bytes()).map_err(|source| EditError::Write {
            file: self.file.clone(),
            source,
        })?;

        Ok(EditResult::Applied {
            file: self.file.clone(),
            bytes_written: self.content.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The original file's permissions carry over to the replacement.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // Same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
