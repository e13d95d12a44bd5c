//! Error types for chumak-kievc.

use std::path::PathBuf;

use chumak_util::error::UtilError;

/// Errors produced by compiler detection and invocation.
///
/// Environment-level failures (`NotFound`, `NotFoundAt`, `NotExecutable`,
/// `Launch`) are deliberately distinct from a compile that ran and reported
/// source errors — the latter is not a `KievcError` at all and is surfaced by
/// the engine as a compilation failure instead.
#[derive(Debug, thiserror::Error)]
pub enum KievcError {
    /// The compiler could not be located anywhere.
    #[error("kievc compiler not found — install the Kiev toolchain and add `kievc` to PATH, set $KIEVC, or set `kievc` under [toolchain] in chumak.toml")]
    NotFound,

    /// An explicitly configured compiler path does not exist.
    #[error("configured kievc at {path} does not exist — fix `kievc` under [toolchain] in chumak.toml")]
    NotFoundAt { path: String },

    /// The compiler binary exists but is not executable.
    #[error("kievc at {} is not executable — check file permissions", path.display())]
    NotExecutable { path: PathBuf },

    /// The compiler process could not be launched.
    #[error("cannot launch kievc at {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The compiler did not finish within the configured time limit.
    #[error("kievc did not finish within {seconds}s — process killed")]
    Timeout { seconds: u64 },

    /// `kievc -version` produced output with no recognizable version in it.
    #[error("cannot parse kievc version from output: {output}")]
    VersionParse { output: String },

    /// The compiler binary could not be fingerprinted.
    #[error("cannot fingerprint kievc binary at {}: {source}", path.display())]
    Fingerprint {
        path: PathBuf,
        source: UtilError,
    },

    /// An invocation was built without source files.
    #[error("no source files to compile")]
    NoSources,

    /// An invocation was built without an output directory.
    #[error("no output directory set")]
    NoOutput,

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] UtilError),
}
