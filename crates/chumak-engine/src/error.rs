//! Error types for chumak-engine.

/// Errors produced by the build pipeline.
///
/// The taxonomy matters to callers: configuration problems fail the
/// configuration phase, `Resolution` and toolchain failures are fatal
/// environment errors, and `CompileFailed` is the one *expected* failure —
/// the compiler ran and the sources are at fault.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] chumak_util::error::UtilError),

    /// A manifest operation failed.
    #[error("{0}")]
    Manifest(#[from] chumak_config::manifest::ManifestError),

    /// The state snapshot could not be persisted.
    #[error("{0}")]
    Snapshot(#[from] chumak_config::snapshot::SnapshotError),

    /// A toolchain-level failure: compiler missing, unlaunchable, or timed
    /// out. Never caused by the sources being compiled.
    #[error("{0}")]
    Kievc(#[from] chumak_kievc::KievcError),

    /// A source set name was registered twice.
    #[error("source set `{name}` is already registered")]
    DuplicateSourceSet { name: String },

    /// A source set was registered with no source roots.
    #[error("source set `{name}` has no source roots")]
    EmptySourceRoots { name: String },

    /// A source set name is not registered.
    #[error("no source set named `{name}` — available: {}", available.join(", "))]
    UnknownSourceSet {
        name: String,
        available: Vec<String>,
    },

    /// The dependency resolution collaborator failed; no partial classpath
    /// is ever used.
    #[error("cannot resolve dependency `{declaration}`: {message}")]
    Resolution {
        declaration: String,
        message: String,
    },

    /// A source set's roots contain no compilable files.
    #[error("no source files found under {dir}")]
    NoSources { dir: String },

    /// The compiler ran and reported errors in the sources.
    #[error("compilation failed with {error_count} error(s)")]
    CompileFailed { error_count: usize },

    /// The compiler succeeded with warnings and `fail_on_warning` is set.
    #[error("compilation produced {warning_count} warning(s) and fail_on_warning is set")]
    WarningsRejected { warning_count: usize },

    /// The compiler wrote a file outside the staging tree.
    #[error("compiler wrote {path} outside the output directory {output_dir}")]
    StrayOutput { path: String, output_dir: String },

    /// A project already exists at the target path.
    #[error("chumak.toml already exists at {path} — cannot initialize over an existing project")]
    ProjectExists { path: String },
}
