//! Build orchestration for the Kiev compiler: source set registry, classpath
//! resolution, incremental change detection, compiler invocation, and output
//! staging.

pub mod build;
pub mod classpath;
mod diagnostics;
pub mod error;
pub mod incremental;
pub mod init;
pub mod source_set;
pub mod stage;

pub use build::{build, build_with, clean, BuildOptions, BuildOutcome, BuildSummary};
pub use classpath::{resolve_classpath, Classpath, DependencyResolver, PathResolver};
pub use error::EngineError;
pub use incremental::{detect_changes, RecompileReason, Verdict};
pub use init::init_project;
pub use source_set::{SourceSet, SourceSetRegistry};
pub use stage::ArtifactSet;
