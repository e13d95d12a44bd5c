//! Compiler detection, invocation, and diagnostics normalization for `kievc`.

pub mod detect;
pub mod error;
pub mod invoke;

pub use detect::{resolve_kievc, KievcInfo};
pub use error::KievcError;
pub use invoke::{
    CompilerExecutor, Diagnostic, InvocationOutcome, KievcCommand, Severity, SubprocessExecutor,
};
