//! Snapshot naming and the snapshot directory.
//!
//! A snapshot is the file the interpreter writes for its own `save` command.
//! Its name is `identity.title.label`. Titles never contain a dot and labels
//! are refused if they do, so the last two segments always decode back to the
//! title and label and distinct triples never share a file.

use crate::{Result, ZgateError};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zgate_types::{GameTitle, AUTOSAVE_LABEL};

/// Identifies one snapshot file: (identity, title, label).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotId {
    identity: String,
    title: GameTitle,
    label: String,
}

impl SnapshotId {
    /// Validate the parts and build the identifier.
    pub fn new(identity: &str, title: GameTitle, label: &str) -> Result<Self> {
        validate_identity(identity)?;
        validate_label(label)?;
        Ok(Self {
            identity: identity.to_string(),
            title,
            label: label.to_string(),
        })
    }

    /// The implicit checkpoint for (identity, title).
    pub fn autosave(identity: &str, title: GameTitle) -> Result<Self> {
        Self::new(identity, title, AUTOSAVE_LABEL)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn title(&self) -> GameTitle {
        self.title
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_autosave(&self) -> bool {
        self.label == AUTOSAVE_LABEL
    }

    /// Storage key: `identity.title.label`.
    pub fn key(&self) -> String {
        format!("{}.{}.{}", self.identity, self.title, self.label)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Characters that read as a protocol marker when the pty echoes a snapshot path.
const ECHO_MARKERS: [char; 2] = ['>', '?'];

/// Check a save label before it becomes part of a file name.
pub fn validate_label(label: &str) -> Result<()> {
    let reason = if label.is_empty() {
        "label is empty"
    } else if label.contains("..") {
        "parent-directory segment"
    } else if label.starts_with('/') || label.starts_with('\\') {
        "absolute path"
    } else if label.contains('/') || label.contains('\\') {
        "path separator"
    } else if label.contains('.') {
        "labels may not contain '.'"
    } else if label.contains(ECHO_MARKERS) {
        "labels may not contain '>' or '?'"
    } else if label.chars().any(char::is_control) {
        "control character"
    } else {
        return Ok(());
    };

    Err(ZgateError::InvalidLabel {
        label: label.to_string(),
        reason,
    })
}

/// Identities are e-mail-like; dots are fine, path syntax is not.
pub fn validate_identity(identity: &str) -> Result<()> {
    let bad = identity.is_empty()
        || identity.contains("..")
        || identity.contains('/')
        || identity.contains('\\')
        || identity.contains(ECHO_MARKERS)
        || identity.chars().any(char::is_control);

    if bad {
        Err(ZgateError::InvalidIdentity(identity.to_string()))
    } else {
        Ok(())
    }
}

/// Flat directory holding every snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it doesn't exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Path handed to the interpreter's save/restore prompt.
    pub fn path_for(&self, id: &SnapshotId) -> PathBuf {
        self.dir.join(id.key())
    }

    /// Whether the interpreter has written this snapshot.
    pub fn exists(&self, id: &SnapshotId) -> bool {
        self.path_for(id).is_file()
    }

    /// Delete a snapshot file. Returns false when there was nothing to delete.
    pub fn remove(&self, id: &SnapshotId) -> Result<bool> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(target: "zgate::snapshot", "Removed snapshot {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(target: "zgate::snapshot", "Snapshot {} is recorded but missing on disk", id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
