//! The persisted incremental state: what was compiled last time, from what
//! inputs, and what it produced.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Format version tag. Bump on any incompatible change; an unknown version on
/// disk is treated as "no prior state" so the next build recompiles instead of
/// misparsing.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Recorded state of one source set after a successful compile.
///
/// One snapshot file per source set, written atomically and only after the
/// compiler exited successfully. A failed or interrupted compile never touches
/// the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// SHA-256 of the `kievc` binary the outputs were produced with.
    pub toolchain_fingerprint: String,
    /// Composite hash over the ordered classpath entries and their contents.
    pub classpath_fingerprint: String,
    /// Content fingerprints of every compiled source file, sorted by path.
    /// Paths are relative to the project root.
    #[serde(default, rename = "file")]
    pub files: Vec<FileFingerprint>,
    /// Output files produced by the compile, relative to the output directory.
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

/// A single source file's path and content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub hash: String,
}

impl Snapshot {
    /// Load a snapshot from disk.
    ///
    /// Returns `None` when the file is missing, unreadable, unparseable, or
    /// carries an unknown version tag — every one of those means the prior
    /// state cannot be trusted and the source set needs a full recompile.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let snapshot: Snapshot = toml::from_str(&content).ok()?;
        (snapshot.version == SNAPSHOT_VERSION).then_some(snapshot)
    }

    /// Write the snapshot to disk as human-readable TOML.
    ///
    /// Uses atomic replacement (write-to-temp-then-rename) so a crash mid-write
    /// leaves the previous valid snapshot intact.
    ///
    /// # Errors
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), SnapshotError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SnapshotError::Serialize { source: e })?;
        chumak_util::fs::atomic_write(path, &content).map_err(|e| SnapshotError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot serialize state snapshot: {source}")]
    Serialize { source: toml::ser::Error },
    #[error("cannot write {path}: {message}")]
    Write { path: String, message: String },
}
