//! Filesystem utilities for Chumak.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Write `contents` to `path` atomically: write to a sibling temp file, then rename.
///
/// The previous file (if any) is either fully intact or fully replaced, never
/// half-written. The temp file is removed on every failure path.
///
/// # Errors
/// Returns an error if the parent directory cannot be created, the temp file
/// cannot be written, or the rename fails.
pub fn atomic_write(path: &Path, contents: &str) -> Result<(), UtilError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let Some(file_name) = path.file_name() else {
        return Err(UtilError::NoFileName {
            path: path.display().to_string(),
        });
    };
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    if let Err(source) = std::fs::write(&tmp, contents) {
        let _ = std::fs::remove_file(&tmp);
        return Err(UtilError::Io {
            path: tmp.display().to_string(),
            source,
        });
    }

    if let Err(source) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        });
    }

    Ok(())
}

/// Collect all files under `dir` whose extension is in `extensions`, recursively,
/// sorted by path.
///
/// # Errors
/// Returns an error if `dir` cannot be read.
pub fn collect_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, UtilError> {
    let mut files = Vec::new();
    collect_recursive(dir, &mut |path| {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|wanted| wanted == e))
    }, &mut files)?;
    files.sort();
    Ok(files)
}

/// Collect every file under `dir`, recursively, sorted by path.
///
/// Returns an empty list if `dir` does not exist.
///
/// # Errors
/// Returns an error if an existing directory cannot be read.
pub fn collect_tree(dir: &Path) -> Result<Vec<PathBuf>, UtilError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    collect_recursive(dir, &mut |_| true, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_recursive(
    dir: &Path,
    keep: &mut dyn FnMut(&Path) -> bool,
    out: &mut Vec<PathBuf>,
) -> Result<(), UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| UtilError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_recursive(&path, keep, out)?;
        } else if keep(&path) {
            out.push(path);
        }
    }

    Ok(())
}

/// Recursively copy the contents of `src` into `dest`, creating `dest` if needed.
///
/// Used as a fallback when a directory rename fails (e.g. across filesystems).
///
/// # Errors
/// Returns an error if any file or directory cannot be copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), UtilError> {
    ensure_dir(dest)?;
    let entries = std::fs::read_dir(src).map_err(|source| UtilError::Io {
        path: src.display().to_string(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: src.display().to_string(),
            source,
        })?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|source| UtilError::Io {
                path: to.display().to_string(),
                source,
            })?;
        }
    }
    Ok(())
}
