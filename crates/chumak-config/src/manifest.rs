use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The `chumak.toml` project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub package: Package,
    #[serde(default)]
    pub toolchain: Toolchain,
    #[serde(default)]
    pub compiler: CompilerOptions,
    /// Named source sets, e.g. `[source-set.main]` and `[source-set.test]`.
    #[serde(default, rename = "source-set")]
    pub source_sets: BTreeMap<String, SourceSetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
}

/// Where to find the `kievc` compiler and how long to wait for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Toolchain {
    /// Explicit path to the `kievc` launcher. Falls back to `$KIEVC`, then `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kievc: Option<PathBuf>,
    /// Bounded wait for one compiler invocation, in seconds. No limit when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Options passed to (or controlling) the compiler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Source file encoding handed to `kievc -encoding`.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Source file extensions discovered under the source roots.
    /// Add `"java"` for joint Java/Kiev compilation.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Extra flags appended to the compiler command line verbatim.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Treat a compile that succeeds with warnings as a failure.
    #[serde(default)]
    pub fail_on_warning: bool,
    /// Echo the list of files being compiled.
    #[serde(default)]
    pub list_files: bool,
}

fn default_encoding() -> String {
    "UTF-8".to_owned()
}

fn default_extensions() -> Vec<String> {
    vec!["kiev".to_owned()]
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            extensions: default_extensions(),
            extra_args: Vec::new(),
            fail_on_warning: false,
            list_files: false,
        }
    }
}

/// One source set: where its sources live, where its classes go, what it
/// compiles against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSetConfig {
    /// Source root directories, relative to the project root.
    pub roots: Vec<PathBuf>,
    /// Output directory for compiled classes, relative to the project root.
    pub output: PathBuf,
    /// Classpath declarations (jar files or class directories) handed to the
    /// dependency resolver.
    #[serde(default)]
    pub classpath: Vec<String>,
}

impl Manifest {
    /// Read and parse a `chumak.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(manifest)
    }

    /// Serialize the manifest to pretty TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ManifestError> {
        toml::to_string_pretty(self).map_err(|e| ManifestError::Serialize { source: e })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid chumak.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("cannot serialize manifest: {source}")]
    Serialize { source: toml::ser::Error },
}
