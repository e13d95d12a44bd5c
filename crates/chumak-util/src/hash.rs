//! Hashing utilities for change detection and classpath fingerprinting.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::UtilError;

/// Compute the SHA-256 hex digest of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 hex digest of a file using streaming reads.
///
/// Uses a 64 KiB buffer to avoid loading the entire file into memory,
/// which matters for large classpath entries like fat jars.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String, UtilError> {
    let file = std::fs::File::open(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = std::io::Read::read(&mut reader, &mut buf).map_err(|source| UtilError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        let Some(chunk) = buf.get(..n) else {
            break; // unreachable: n is bounded by buf.len()
        };
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash all files matching `pattern` inside `dir`, sorted by relative path for determinism.
///
/// The `pattern` is a glob expression (e.g. `"**/*.class"`). Files are sorted by their
/// path relative to `dir` before hashing so the result is stable across runs.
///
/// # Errors
/// Returns an error if the glob pattern is invalid, `dir` cannot be read, or any
/// matched file cannot be read.
pub fn sha256_dir(dir: &Path, pattern: &str) -> Result<String, UtilError> {
    let full_pattern = dir.join(pattern);
    let full_pattern_str = full_pattern.display().to_string();

    let mut paths: Vec<_> = glob::glob(&full_pattern_str)
        .map_err(|e| UtilError::GlobPattern {
            pattern: full_pattern_str.clone(),
            message: e.to_string(),
        })?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();

    paths.sort();

    let mut hasher = Sha256::new();
    for path in &paths {
        // Include the relative path in the hash so renames are detected.
        let relative = path.strip_prefix(dir).unwrap_or(path);
        hasher.update(relative.display().to_string().as_bytes());

        let data = std::fs::read(path).map_err(|source| UtilError::Io {
            path: path.display().to_string(),
            source,
        })?;
        hasher.update(&data);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Combine multiple string parts into a single composite SHA-256 hash.
///
/// Each part is hashed in order with a length prefix to prevent ambiguity.
pub fn sha256_multi(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        // Length-prefix each part to avoid collisions like ["ab","c"] vs ["a","bc"].
        let len_bytes = part.len().to_le_bytes();
        hasher.update(len_bytes);
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
