//! Incremental change detection: decides whether a source set needs
//! recompilation by comparing content fingerprints against the persisted
//! snapshot of the last successful compile.
//!
//! The decision is deterministic and side-effect-free — state is only ever
//! written by the staging step after a successful compile.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use chumak_config::snapshot::{FileFingerprint, Snapshot};
use chumak_util::error::UtilError;

use crate::error::EngineError;

/// The change detector's verdict for one source set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Inputs and recorded outputs are identical to the last successful
    /// compile; the compiler invocation is skipped entirely.
    UpToDate,
    /// The whole set must be recompiled. The compiled language's batch
    /// compiler offers no per-symbol incremental contract, so any detected
    /// change conservatively invalidates the full module.
    Recompile(RecompileReason),
}

/// Why a full recompilation is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecompileReason {
    /// No usable snapshot: first build, unreadable state, or an incompatible
    /// state format version.
    NoPriorState,
    /// The compiler binary changed since the last compile.
    ToolchainChanged,
    /// The resolved classpath fingerprint changed; cross-file type
    /// dependencies cannot be tracked, so everything is invalidated.
    ClasspathChanged,
    /// Source files were added, removed, or edited.
    SourcesChanged {
        added: usize,
        removed: usize,
        modified: usize,
    },
    /// The snapshot matches but recorded outputs are gone from disk
    /// (e.g. a cleaned or interrupted build).
    OutputsMissing,
}

impl fmt::Display for RecompileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPriorState => f.write_str("no prior build state"),
            Self::ToolchainChanged => f.write_str("compiler changed"),
            Self::ClasspathChanged => f.write_str("classpath changed"),
            Self::SourcesChanged {
                added,
                removed,
                modified,
            } => write!(
                f,
                "sources changed: {added} added, {removed} removed, {modified} modified"
            ),
            Self::OutputsMissing => f.write_str("recorded outputs missing"),
        }
    }
}

/// Verdict plus the freshly computed fingerprints, so the staging step can
/// persist them without hashing every file a second time.
#[derive(Debug)]
pub struct ChangeSet {
    pub verdict: Verdict,
    /// Current content fingerprints, sorted by project-relative path.
    pub current: Vec<FileFingerprint>,
}

/// Decide whether `sources` need recompilation given the persisted snapshot.
///
/// Comparison is by content hash, never by timestamp, so checkout/restore
/// scenarios with rewritten timestamps stay correct in both directions.
///
/// # Errors
/// Returns an error if a source file cannot be read for hashing.
pub fn detect_changes(
    project_root: &Path,
    sources: &[PathBuf],
    snapshot: Option<&Snapshot>,
    toolchain_fingerprint: &str,
    classpath_fingerprint: &str,
    output_dir: &Path,
) -> Result<ChangeSet, EngineError> {
    let current = fingerprint_sources(project_root, sources)?;

    let Some(snap) = snapshot else {
        return Ok(ChangeSet {
            verdict: Verdict::Recompile(RecompileReason::NoPriorState),
            current,
        });
    };

    if snap.toolchain_fingerprint != toolchain_fingerprint {
        return Ok(ChangeSet {
            verdict: Verdict::Recompile(RecompileReason::ToolchainChanged),
            current,
        });
    }

    if snap.classpath_fingerprint != classpath_fingerprint {
        return Ok(ChangeSet {
            verdict: Verdict::Recompile(RecompileReason::ClasspathChanged),
            current,
        });
    }

    let previous: BTreeMap<&Path, &str> = snap
        .files
        .iter()
        .map(|f| (f.path.as_path(), f.hash.as_str()))
        .collect();
    let now: BTreeMap<&Path, &str> = current
        .iter()
        .map(|f| (f.path.as_path(), f.hash.as_str()))
        .collect();

    let added = now.keys().filter(|k| !previous.contains_key(*k)).count();
    let removed = previous.keys().filter(|k| !now.contains_key(*k)).count();
    let modified = now
        .iter()
        .filter(|(path, hash)| previous.get(*path).is_some_and(|prev| prev != *hash))
        .count();

    if added + removed + modified > 0 {
        return Ok(ChangeSet {
            verdict: Verdict::Recompile(RecompileReason::SourcesChanged {
                added,
                removed,
                modified,
            }),
            current,
        });
    }

    // Inputs match; confirm the recorded outputs are still on disk before
    // declaring the set up to date.
    let outputs_present = snap.outputs.iter().all(|rel| output_dir.join(rel).is_file());
    if !outputs_present {
        return Ok(ChangeSet {
            verdict: Verdict::Recompile(RecompileReason::OutputsMissing),
            current,
        });
    }

    Ok(ChangeSet {
        verdict: Verdict::UpToDate,
        current,
    })
}

/// Hash every source file, in parallel, returning fingerprints keyed by
/// project-relative path and sorted for determinism.
///
/// # Errors
/// Returns an error if any file cannot be read.
pub fn fingerprint_sources(
    project_root: &Path,
    sources: &[PathBuf],
) -> Result<Vec<FileFingerprint>, EngineError> {
    let mut entries = sources
        .par_iter()
        .map(|path| {
            let hash = chumak_util::hash::sha256_file(path)?;
            let relative = path.strip_prefix(project_root).unwrap_or(path).to_path_buf();
            Ok(FileFingerprint {
                path: relative,
                hash,
            })
        })
        .collect::<Result<Vec<_>, UtilError>>()?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
