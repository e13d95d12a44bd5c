//! Shared diagnostic printing for the build pipeline.

use chumak_kievc::invoke::{InvocationOutcome, Severity};

/// Print structured diagnostics from a compiler invocation to stderr.
///
/// When `verbose` is true, raw compiler stdout/stderr is also printed.
pub(crate) fn print_diagnostics(outcome: &InvocationOutcome, verbose: bool) {
    for diag in &outcome.diagnostics {
        let prefix = match diag.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        match (&diag.file, diag.line, diag.column) {
            (Some(file), Some(line), Some(column)) => {
                eprintln!("{prefix}: {file}:{line}:{column}: {}", diag.message);
            }
            (Some(file), Some(line), None) => {
                eprintln!("{prefix}: {file}:{line}: {}", diag.message);
            }
            _ => eprintln!("{prefix}: {}", diag.message),
        }
    }

    if verbose {
        if !outcome.raw_stdout.is_empty() {
            eprintln!("{}", outcome.raw_stdout);
        }
        if !outcome.raw_stderr.is_empty() {
            eprintln!("{}", outcome.raw_stderr);
        }
    }
}
