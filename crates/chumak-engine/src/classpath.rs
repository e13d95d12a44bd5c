//! Classpath composition: ordering, deduplication, conflict resolution, and
//! fingerprinting of resolved dependency artifacts.
//!
//! Coordinate-to-artifact resolution itself belongs to the host dependency
//! manager, reached through the [`DependencyResolver`] trait.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Whether an entry was declared directly or pulled in transitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    Direct,
    Transitive,
}

/// The logical module identity parsed from an artifact file name,
/// e.g. `symade-core-0.6.0.jar` → name `symade-core`, version `0.6.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleKey {
    pub name: String,
    pub version: String,
}

/// One resolved classpath entry: a jar file or a class directory.
#[derive(Debug, Clone)]
pub struct ClasspathEntry {
    /// Canonical filesystem path.
    pub path: PathBuf,
    pub origin: EntryOrigin,
    /// Parsed module identity, when the file name carries a version.
    pub module: Option<ModuleKey>,
}

/// The composed classpath: ordered entries plus a content fingerprint.
///
/// Order is shadowing order — first entry wins on symbol collision, mirroring
/// JVM classloading — and must be handed to the compiler unchanged.
#[derive(Debug, Clone)]
pub struct Classpath {
    pub entries: Vec<ClasspathEntry>,
    /// Composite hash over the ordered paths and each entry's content.
    /// Any change here invalidates the whole source set.
    pub fingerprint: String,
}

impl Classpath {
    /// The entry paths in shadowing order, as handed to `-classpath`.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An artifact returned by the host dependency manager for one declaration.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    /// True for entries pulled in transitively rather than declared.
    pub transitive: bool,
}

/// A failure inside the dependency resolution collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ResolverError {
    pub message: String,
}

impl ResolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The host dependency manager, seen through a narrow synchronous interface:
/// one declaration in, resolved artifact paths out (direct entry first, its
/// transitive entries after).
pub trait DependencyResolver {
    /// Resolve one dependency declaration into artifact paths.
    ///
    /// # Errors
    /// Returns an error when the declaration cannot be resolved; the caller
    /// treats this as fatal for the build invocation.
    fn resolve(&self, declaration: &str) -> Result<Vec<ResolvedArtifact>, ResolverError>;
}

/// The built-in resolver: declarations are paths to jar files or class
/// directories, relative to the project root.
#[derive(Debug)]
pub struct PathResolver {
    project_root: PathBuf,
}

impl PathResolver {
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
        }
    }
}

impl DependencyResolver for PathResolver {
    fn resolve(&self, declaration: &str) -> Result<Vec<ResolvedArtifact>, ResolverError> {
        let path = self.project_root.join(declaration);
        let canonical = path.canonicalize().map_err(|e| {
            ResolverError::new(format!(
                "{} does not resolve to an artifact: {e}",
                path.display()
            ))
        })?;
        Ok(vec![ResolvedArtifact {
            path: canonical,
            transitive: false,
        }])
    }
}

/// Compose a classpath from dependency declarations.
///
/// The resolver is consulted once per declaration; declaration order is
/// preserved, all direct entries precede appended transitive entries,
/// duplicates are dropped by canonical path, and on a duplicate logical
/// module at different versions the first occurrence wins ("nearest wins").
///
/// # Errors
/// Returns an error if any declaration fails to resolve (no partial classpath
/// is used) or an entry cannot be fingerprinted.
pub fn resolve_classpath(
    declarations: &[String],
    resolver: &dyn DependencyResolver,
) -> Result<Classpath, EngineError> {
    let mut direct = Vec::new();
    let mut transitive = Vec::new();
    for declaration in declarations {
        let artifacts =
            resolver
                .resolve(declaration)
                .map_err(|e| EngineError::Resolution {
                    declaration: declaration.clone(),
                    message: e.to_string(),
                })?;
        for artifact in artifacts {
            if artifact.transitive {
                transitive.push(artifact.path);
            } else {
                direct.push(artifact.path);
            }
        }
    }

    let mut entries: Vec<ClasspathEntry> = Vec::new();
    let mut seen_paths: BTreeSet<PathBuf> = BTreeSet::new();
    let mut seen_modules: BTreeSet<String> = BTreeSet::new();

    for (paths, origin) in [
        (direct, EntryOrigin::Direct),
        (transitive, EntryOrigin::Transitive),
    ] {
        for path in paths {
            let canonical = path.canonicalize().unwrap_or(path);
            if !seen_paths.insert(canonical.clone()) {
                continue;
            }
            let module = parse_module_key(&canonical);
            if let Some(key) = &module {
                if !seen_modules.insert(key.name.clone()) {
                    eprintln!(
                        "warning: duplicate module `{}` on classpath — nearest wins, dropping {}",
                        key.name,
                        canonical.display()
                    );
                    continue;
                }
            }
            entries.push(ClasspathEntry {
                path: canonical,
                origin,
                module,
            });
        }
    }

    let fingerprint = fingerprint_entries(&entries)?;
    Ok(Classpath {
        entries,
        fingerprint,
    })
}

/// Parse `name-version` out of an artifact file name. A dash followed by a
/// digit starts the version, so `symade-core-0.6.0` splits after `symade-core`.
fn parse_module_key(path: &Path) -> Option<ModuleKey> {
    if !path.is_file() {
        return None; // class directories carry no version notion
    }
    let stem = path.file_stem()?.to_str()?;
    for (idx, _) in stem.match_indices('-') {
        let after = stem.get(idx + 1..)?;
        if after.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let name = stem.get(..idx)?;
            if name.is_empty() {
                return None;
            }
            return Some(ModuleKey {
                name: name.to_owned(),
                version: after.to_owned(),
            });
        }
    }
    None
}

/// Fingerprint the ordered entry list: each entry contributes its path and a
/// content digest (the file for jars, `**/*.class` for directories), so both
/// reordering and a rebuilt artifact at an unchanged path invalidate.
fn fingerprint_entries(entries: &[ClasspathEntry]) -> Result<String, EngineError> {
    let mut parts: Vec<String> = Vec::new();
    for entry in entries {
        parts.push(entry.path.display().to_string());
        let digest = if entry.path.is_dir() {
            chumak_util::hash::sha256_dir(&entry.path, "**/*.class")?
        } else {
            chumak_util::hash::sha256_file(&entry.path)?
        };
        parts.push(digest);
    }
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    Ok(chumak_util::hash::sha256_multi(&refs))
}
