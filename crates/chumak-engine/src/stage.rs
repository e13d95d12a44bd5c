//! Output staging: verify produced files, swap them into the declared output
//! directory, and persist the state snapshot atomically.

use std::path::{Path, PathBuf};

use chumak_config::snapshot::{FileFingerprint, Snapshot, SNAPSHOT_VERSION};

use crate::error::EngineError;
use crate::source_set::SourceSet;

/// The staged outputs of one source set, as exposed to downstream tasks.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    /// The declared output directory of the source set.
    pub output_dir: PathBuf,
    /// Absolute paths of the staged output files.
    pub files: Vec<PathBuf>,
}

/// Stage a fresh compile.
///
/// The compiler was pointed at `scratch_dir`, never at the declared output
/// directory, so a failed compile upstream of this call cannot have disturbed
/// previously staged outputs. Here, on success only:
/// 1. every produced file is verified to live inside the staging tree
///    (a symlink planted by a misdirected compiler would escape it);
/// 2. the staging tree replaces the declared output directory;
/// 3. the new snapshot is written atomically (temp file + rename), so the
///    snapshot on disk always corresponds to a successful compile.
///
/// # Errors
/// Returns an error if verification fails or any filesystem step fails.
pub fn stage_fresh(
    set: &SourceSet,
    scratch_dir: &Path,
    files: Vec<FileFingerprint>,
    toolchain_fingerprint: &str,
    classpath_fingerprint: &str,
    state_path: &Path,
) -> Result<ArtifactSet, EngineError> {
    let produced = chumak_util::fs::collect_tree(scratch_dir)?;
    let outputs = verify_outputs(&produced, scratch_dir, &set.output_dir)?;

    swap_outputs(scratch_dir, &set.output_dir)?;

    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        toolchain_fingerprint: toolchain_fingerprint.to_owned(),
        classpath_fingerprint: classpath_fingerprint.to_owned(),
        files,
        outputs: outputs.clone(),
    };
    snapshot.write_to(state_path)?;

    Ok(ArtifactSet {
        output_dir: set.output_dir.clone(),
        files: outputs
            .iter()
            .map(|relative| set.output_dir.join(relative))
            .collect(),
    })
}

/// Re-expose the output set recorded by the previous successful compile,
/// without touching the filesystem.
pub fn stage_up_to_date(set: &SourceSet, snapshot: &Snapshot) -> ArtifactSet {
    ArtifactSet {
        output_dir: set.output_dir.clone(),
        files: snapshot
            .outputs
            .iter()
            .map(|relative| set.output_dir.join(relative))
            .collect(),
    }
}

/// Check that every produced file canonicalizes to a location inside the
/// staging tree, and return the produced paths relative to it.
fn verify_outputs(
    produced: &[PathBuf],
    scratch_dir: &Path,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, EngineError> {
    let canonical_scratch = scratch_dir.canonicalize().map_err(|source| EngineError::Io {
        path: scratch_dir.display().to_string(),
        source,
    })?;

    let mut outputs = Vec::new();
    for path in produced {
        let canonical = path.canonicalize().map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if !canonical.starts_with(&canonical_scratch) {
            return Err(EngineError::StrayOutput {
                path: canonical.display().to_string(),
                output_dir: output_dir.display().to_string(),
            });
        }
        outputs.push(path.strip_prefix(scratch_dir).unwrap_or(path).to_path_buf());
    }
    Ok(outputs)
}

/// Replace the declared output directory with the staging tree.
fn swap_outputs(scratch: &Path, output_dir: &Path) -> Result<(), EngineError> {
    chumak_util::fs::remove_dir_all_if_exists(output_dir)?;
    if let Some(parent) = output_dir.parent() {
        chumak_util::fs::ensure_dir(parent)?;
    }
    if std::fs::rename(scratch, output_dir).is_err() {
        // Cross-filesystem fallback.
        chumak_util::fs::copy_tree(scratch, output_dir)?;
        chumak_util::fs::remove_dir_all_if_exists(scratch)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    fn set_in(dir: &Path) -> SourceSet {
        SourceSet {
            name: "main".to_owned(),
            roots: vec![dir.join("src")],
            output_dir: dir.join("build").join("classes"),
        }
    }

    #[test]
    fn stage_fresh_swaps_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let set = set_in(tmp.path());
        let scratch = tmp.path().join("scratch");
        let pkg = scratch.join("pkg");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("A.class"), b"cafebabe").unwrap();

        let state_path = tmp.path().join(".chumak").join("state").join("main.toml");
        let artifacts =
            stage_fresh(&set, &scratch, Vec::new(), "tc", "cp", &state_path).unwrap();

        assert_eq!(artifacts.output_dir, set.output_dir);
        assert_eq!(
            artifacts.files,
            vec![set.output_dir.join("pkg").join("A.class")]
        );
        assert!(set.output_dir.join("pkg").join("A.class").is_file());
        assert!(!scratch.exists());

        let snapshot = Snapshot::load(&state_path).unwrap();
        assert_eq!(snapshot.outputs, vec![PathBuf::from("pkg").join("A.class")]);
        assert_eq!(snapshot.classpath_fingerprint, "cp");
    }

    #[test]
    fn stage_fresh_replaces_stale_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let set = set_in(tmp.path());

        // A previous build left an output behind that the new compile no
        // longer produces.
        fs::create_dir_all(&set.output_dir).unwrap();
        fs::write(set.output_dir.join("Old.class"), b"stale").unwrap();

        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join("New.class"), b"fresh").unwrap();

        let state_path = tmp.path().join("state.toml");
        stage_fresh(&set, &scratch, Vec::new(), "tc", "cp", &state_path).unwrap();

        assert!(set.output_dir.join("New.class").is_file());
        assert!(!set.output_dir.join("Old.class").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_escape_is_a_stray_output() {
        let tmp = tempfile::tempdir().unwrap();
        let set = set_in(tmp.path());
        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();

        let outside = tmp.path().join("outside.class");
        fs::write(&outside, b"x").unwrap();
        std::os::unix::fs::symlink(&outside, scratch.join("Sneaky.class")).unwrap();

        let state_path = tmp.path().join("state.toml");
        let result = stage_fresh(&set, &scratch, Vec::new(), "tc", "cp", &state_path);
        assert!(matches!(result, Err(EngineError::StrayOutput { .. })));
        // No snapshot is written for a rejected compile.
        assert!(!state_path.exists());
    }

    #[test]
    fn up_to_date_restages_without_touching_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let set = set_in(tmp.path());

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            toolchain_fingerprint: "tc".to_owned(),
            classpath_fingerprint: "cp".to_owned(),
            files: Vec::new(),
            outputs: vec![PathBuf::from("A.class"), PathBuf::from("pkg").join("B.class")],
        };

        let artifacts = stage_up_to_date(&set, &snapshot);
        assert_eq!(artifacts.files.len(), 2);
        assert_eq!(
            artifacts.files.first().unwrap(),
            &set.output_dir.join("A.class")
        );
        // Nothing was created on disk.
        assert!(!set.output_dir.exists());
    }

    #[test]
    fn empty_compile_output_is_allowed() {
        let tmp = tempfile::tempdir().unwrap();
        let set = set_in(tmp.path());
        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();

        let state_path = tmp.path().join("state.toml");
        let artifacts =
            stage_fresh(&set, &scratch, Vec::new(), "tc", "cp", &state_path).unwrap();
        assert!(artifacts.files.is_empty());
        assert!(Snapshot::load(&state_path).unwrap().outputs.is_empty());
    }
}
