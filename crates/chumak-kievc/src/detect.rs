//! Compiler detection and version parsing.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::KievcError;

/// Information about a detected `kievc` installation.
#[derive(Debug, Clone)]
pub struct KievcInfo {
    /// Absolute path to the `kievc` launcher.
    pub path: PathBuf,
    /// Parsed version (e.g. "0.6.0-SNAPSHOT").
    pub version: String,
    /// SHA-256 hex digest of the launcher, folded into the incremental state
    /// so a toolchain swap invalidates prior outputs.
    pub fingerprint: String,
}

/// Locate `kievc` and determine its version and fingerprint.
///
/// Resolution order:
/// 1. The explicitly configured path (`[toolchain] kievc` in chumak.toml)
/// 2. `KIEVC` environment variable
/// 3. `PATH` lookup via `which`
///
/// # Errors
/// Returns an error if `kievc` is not found, is not executable, returns an
/// unparseable version string, or cannot be fingerprinted.
pub fn resolve_kievc(configured: Option<&Path>) -> Result<KievcInfo, KievcError> {
    let path = resolve_kievc_path(configured)?;
    check_executable(&path)?;
    let version = query_version(&path)?;
    let fingerprint = compute_fingerprint(&path)?;

    Ok(KievcInfo {
        path,
        version,
        fingerprint,
    })
}

/// Parse a version from raw `kievc -version` output.
///
/// Handles formats like:
/// - `kievc 0.6.0 (SymADE compiler)`
/// - `kiev compiler version 0.6.0-SNAPSHOT`
/// - `0.6.0`
pub fn parse_version(raw: &str) -> Option<String> {
    // Look for a semver-like token: digits.digits.digits (optional -suffix)
    for token in raw.split_whitespace() {
        let trimmed = token.trim_start_matches('v');
        if is_semver_like(trimmed) {
            return Some(trimmed.to_owned());
        }
    }
    None
}

fn is_semver_like(s: &str) -> bool {
    let mut parts = s.split('.');
    let Some(major) = parts.next() else {
        return false;
    };
    let Some(minor) = parts.next() else {
        return false;
    };
    let Some(patch_part) = parts.next() else {
        return false;
    };
    // No more than 3 dot-separated components for basic semver
    if parts.next().is_some() {
        return false;
    }

    // patch_part may contain a pre-release suffix like "0-SNAPSHOT"
    let patch = patch_part.split('-').next().unwrap_or(patch_part);

    !major.is_empty()
        && !minor.is_empty()
        && !patch.is_empty()
        && major.chars().all(|c| c.is_ascii_digit())
        && minor.chars().all(|c| c.is_ascii_digit())
        && patch.chars().all(|c| c.is_ascii_digit())
}

fn resolve_kievc_path(configured: Option<&Path>) -> Result<PathBuf, KievcError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(KievcError::NotFoundAt {
            path: path.display().to_string(),
        });
    }

    if let Ok(env_path) = std::env::var("KIEVC") {
        let p = PathBuf::from(env_path);
        if p.exists() {
            return Ok(p);
        }
        return Err(KievcError::NotFoundAt {
            path: p.display().to_string(),
        });
    }

    which_kievc().ok_or(KievcError::NotFound)
}

fn which_kievc() -> Option<PathBuf> {
    let output = Command::new("which").arg("kievc").output().ok()?;
    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        let trimmed = path_str.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(PathBuf::from(trimmed))
    } else {
        None
    }
}

fn check_executable(path: &Path) -> Result<(), KievcError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path).map_err(|_| KievcError::NotExecutable {
            path: path.to_path_buf(),
        })?;
        let permissions = metadata.permissions();
        // Check user/group/other execute bits
        if permissions.mode() & 0o111 == 0 {
            return Err(KievcError::NotExecutable {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn query_version(path: &Path) -> Result<String, KievcError> {
    let output = Command::new(path)
        .arg("-version")
        .output()
        .map_err(|source| KievcError::Launch {
            path: path.to_path_buf(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    // kievc prints its banner to stdout or stderr depending on the version.
    let raw = if stdout.trim().is_empty() {
        stderr.trim().to_owned()
    } else {
        stdout.trim().to_owned()
    };

    parse_version(&raw).ok_or_else(|| KievcError::VersionParse {
        output: raw.clone(),
    })
}

fn compute_fingerprint(path: &Path) -> Result<String, KievcError> {
    chumak_util::hash::sha256_file(path).map_err(|source| KievcError::Fingerprint {
        path: path.to_path_buf(),
        source,
    })
}
