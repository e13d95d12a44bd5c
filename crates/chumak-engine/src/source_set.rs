//! The source set registry: named groups of source roots mapped to one
//! output directory each.

use std::path::{Path, PathBuf};

use chumak_config::manifest::Manifest;

use crate::error::EngineError;

/// A named, ordered collection of source directories compiled together into
/// one output directory. Immutable once registered for a build invocation.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub name: String,
    /// Source root directories, absolute.
    pub roots: Vec<PathBuf>,
    /// Where compiled classes for this set are exposed, absolute.
    pub output_dir: PathBuf,
}

impl SourceSet {
    /// Recursively discover source files under the roots, sorted by path.
    ///
    /// Missing roots are skipped (they were already warned about at
    /// registration time — optional source directories are not an error).
    ///
    /// # Errors
    /// Returns an error if an existing root cannot be read.
    pub fn collect_sources(&self, extensions: &[String]) -> Result<Vec<PathBuf>, EngineError> {
        let mut sources = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                continue;
            }
            sources.extend(chumak_util::fs::collect_files(root, extensions)?);
        }
        sources.sort();
        sources.dedup();
        Ok(sources)
    }
}

/// In-memory registry of source sets, built at configuration time.
#[derive(Debug, Default)]
pub struct SourceSetRegistry {
    sets: Vec<SourceSet>,
}

impl SourceSetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the manifest's `[source-set.*]` tables, with
    /// roots and output directories resolved against the project root.
    ///
    /// # Errors
    /// Returns an error if any registration is invalid.
    pub fn from_manifest(project_root: &Path, manifest: &Manifest) -> Result<Self, EngineError> {
        let mut registry = Self::new();
        for (name, config) in &manifest.source_sets {
            let roots = config
                .roots
                .iter()
                .map(|root| project_root.join(root))
                .collect();
            registry.register(name, roots, project_root.join(&config.output))?;
        }
        Ok(registry)
    }

    /// Register a source set.
    ///
    /// Missing root directories are a console warning, not an error.
    ///
    /// # Errors
    /// Returns an error if the name is already registered or `roots` is empty.
    pub fn register(
        &mut self,
        name: &str,
        roots: Vec<PathBuf>,
        output_dir: PathBuf,
    ) -> Result<(), EngineError> {
        if self.sets.iter().any(|set| set.name == name) {
            return Err(EngineError::DuplicateSourceSet {
                name: name.to_owned(),
            });
        }
        if roots.is_empty() {
            return Err(EngineError::EmptySourceRoots {
                name: name.to_owned(),
            });
        }
        for root in &roots {
            if !root.exists() {
                eprintln!(
                    "warning: source root {} of source set `{name}` does not exist",
                    root.display()
                );
            }
        }
        self.sets.push(SourceSet {
            name: name.to_owned(),
            roots,
            output_dir,
        });
        Ok(())
    }

    /// Look up a registered source set by name.
    ///
    /// # Errors
    /// Returns an error naming the available sets if `name` is unregistered.
    pub fn resolve(&self, name: &str) -> Result<&SourceSet, EngineError> {
        self.sets
            .iter()
            .find(|set| set.name == name)
            .ok_or_else(|| EngineError::UnknownSourceSet {
                name: name.to_owned(),
                available: self.names(),
            })
    }

    /// All registered set names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.sets.iter().map(|set| set.name.clone()).collect()
    }
}
