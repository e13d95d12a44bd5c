//! Compiler invocation and diagnostics normalization.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chumak_util::error::UtilError;
use chumak_util::process::CommandOutput;

use crate::detect::KievcInfo;
use crate::error::KievcError;

/// Severity level of a compiler diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single structured diagnostic from the compiler.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,
    /// Human-readable message, verbatim from the compiler.
    pub message: String,
    /// Source file path, if available.
    pub file: Option<String>,
    /// Line number in the source file, if available.
    pub line: Option<u32>,
    /// Column number, if available.
    pub column: Option<u32>,
}

/// Result of one compiler invocation: exit status plus parsed diagnostics.
#[derive(Debug)]
pub struct InvocationOutcome {
    /// Whether the compiler exited with code 0.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
    /// Parsed diagnostics from the compiler's output streams.
    pub diagnostics: Vec<Diagnostic>,
    /// Raw stdout from the compiler.
    pub raw_stdout: String,
    /// Raw stderr from the compiler.
    pub raw_stderr: String,
}

impl InvocationOutcome {
    /// Count the number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Count the number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Format a human-readable summary of the invocation.
    pub fn summary(&self) -> String {
        if self.success {
            let warnings = self.warning_count();
            if warnings > 0 {
                format!("compilation succeeded with {warnings} warning(s)")
            } else {
                "compilation succeeded".to_owned()
            }
        } else {
            let errors = self.error_count();
            format!("compilation failed with {errors} error(s)")
        }
    }
}

/// Runs the compiler process. The engine depends on this capability rather
/// than on `std::process` directly so tests can substitute a fake compiler
/// without spawning anything.
pub trait CompilerExecutor {
    /// Run `kievc` with the given arguments and an optional bounded wait.
    ///
    /// # Errors
    /// Returns an error if the process cannot be spawned or exceeds the limit.
    /// A non-zero exit code is **not** an error here; it is reported through
    /// the returned output.
    fn run(
        &self,
        kievc: &KievcInfo,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, KievcError>;
}

/// The real executor: one child process per invocation, awaited to completion.
#[derive(Debug, Default)]
pub struct SubprocessExecutor;

impl CompilerExecutor for SubprocessExecutor {
    fn run(
        &self,
        kievc: &KievcInfo,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, KievcError> {
        let mut cmd = Command::new(&kievc.path);
        cmd.args(args);
        chumak_util::process::run_command(&mut cmd, timeout).map_err(|e| match e {
            UtilError::Timeout { seconds } => KievcError::Timeout { seconds },
            UtilError::CommandExec { source } => KievcError::Launch {
                path: kievc.path.clone(),
                source,
            },
            other => KievcError::Util(other),
        })
    }
}

/// The JVM classpath separator.
const CLASSPATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Pass sources via an `@argfile` once the list grows beyond this, to stay
/// clear of OS argument-length limits (the Kiev toolchain convention).
const ARGFILE_SOURCE_LIMIT: usize = 32;

/// Builder for constructing a `kievc` invocation.
///
/// Argument shape: `<source files...> -classpath <joined> -d <output dir>
/// -encoding <enc> [extra flags verbatim]`.
#[derive(Debug, Default)]
pub struct KievcCommand {
    sources: Vec<PathBuf>,
    classpath: Vec<PathBuf>,
    dest: Option<PathBuf>,
    encoding: Option<String>,
    extra_args: Vec<String>,
    argfile_dir: Option<PathBuf>,
}

impl KievcCommand {
    /// Create a new empty command builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source files to compile.
    pub fn sources(mut self, paths: &[PathBuf]) -> Self {
        self.sources = paths.to_vec();
        self
    }

    /// Set the compile classpath entries, in shadowing order.
    pub fn classpath(mut self, entries: &[PathBuf]) -> Self {
        self.classpath = entries.to_vec();
        self
    }

    /// Set the output directory (`-d`).
    pub fn dest(mut self, path: &Path) -> Self {
        self.dest = Some(path.to_path_buf());
        self
    }

    /// Set the source file encoding (`-encoding`).
    pub fn encoding(mut self, encoding: &str) -> Self {
        self.encoding = Some(encoding.to_owned());
        self
    }

    /// Append user-supplied flags, passed through verbatim.
    pub fn extra_args(mut self, args: &[String]) -> Self {
        self.extra_args = args.to_vec();
        self
    }

    /// Set the directory where an `@argfile` may be written for long source
    /// lists. Without this, sources are always passed inline.
    pub fn argfile_dir(mut self, dir: &Path) -> Self {
        self.argfile_dir = Some(dir.to_path_buf());
        self
    }

    /// Build the full argument list without executing.
    ///
    /// # Errors
    /// Returns an error if sources or the output directory are not set.
    pub fn build_args(&self) -> Result<Vec<String>, KievcError> {
        if self.sources.is_empty() {
            return Err(KievcError::NoSources);
        }
        let mut args: Vec<String> = self
            .sources
            .iter()
            .map(|src| src.display().to_string())
            .collect();
        args.extend(self.tail_args()?);
        Ok(args)
    }

    /// Everything after the source file list.
    fn tail_args(&self) -> Result<Vec<String>, KievcError> {
        let Some(dest) = &self.dest else {
            return Err(KievcError::NoOutput);
        };

        let mut args = Vec::new();

        if !self.classpath.is_empty() {
            let joined = self
                .classpath
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(&CLASSPATH_SEPARATOR.to_string());
            args.push("-classpath".to_owned());
            args.push(joined);
        }

        args.push("-d".to_owned());
        args.push(dest.display().to_string());

        if let Some(encoding) = &self.encoding {
            args.push("-encoding".to_owned());
            args.push(encoding.clone());
        }

        // User-supplied flags pass through untouched.
        args.extend(self.extra_args.iter().cloned());

        Ok(args)
    }

    /// Build the argument list, switching to an `@argfile` for long source
    /// lists. Returns the argfile path (if one was written) so the caller can
    /// remove it after the run.
    fn effective_args(&self) -> Result<(Vec<String>, Option<PathBuf>), KievcError> {
        if self.sources.is_empty() {
            return Err(KievcError::NoSources);
        }

        if let Some(dir) = &self.argfile_dir {
            if self.sources.len() > ARGFILE_SOURCE_LIMIT {
                chumak_util::fs::ensure_dir(dir)?;
                let argfile = dir.join("kievc-sources.txt");
                let mut list = String::new();
                for src in &self.sources {
                    list.push_str(&src.display().to_string());
                    list.push('\n');
                }
                std::fs::write(&argfile, list).map_err(|source| {
                    KievcError::Util(UtilError::Io {
                        path: argfile.display().to_string(),
                        source,
                    })
                })?;

                let mut args = vec![format!("@{}", argfile.display())];
                args.extend(self.tail_args()?);
                return Ok((args, Some(argfile)));
            }
        }

        Ok((self.build_args()?, None))
    }

    /// Execute the invocation through the given executor and parse its output.
    ///
    /// # Errors
    /// Returns an error if the argument list is incomplete, the process cannot
    /// be spawned, or it exceeds the time limit. A compile that ran and failed
    /// is reported through `InvocationOutcome::success`, not as an `Err`.
    pub fn execute(
        &self,
        kievc: &KievcInfo,
        executor: &dyn CompilerExecutor,
        timeout: Option<Duration>,
    ) -> Result<InvocationOutcome, KievcError> {
        let (args, argfile) = self.effective_args()?;

        let run_result = executor.run(kievc, &args, timeout);

        if let Some(path) = argfile {
            let _ = std::fs::remove_file(path);
        }

        let output = run_result?;

        let mut diagnostics = parse_diagnostics(&output.stderr);
        diagnostics.extend(parse_diagnostics(&output.stdout));

        Ok(InvocationOutcome {
            success: output.success,
            exit_code: output.exit_code,
            diagnostics,
            raw_stdout: output.stdout,
            raw_stderr: output.stderr,
        })
    }
}

/// Parse compiler output into structured diagnostics.
///
/// Handles the kievc diagnostic formats:
/// - `File.kiev:10:5: error: message`
/// - `File.kiev:10: warning: message`
/// - `error: message`
pub fn parse_diagnostics(stream: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for line in stream.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(diag) = try_parse_located_diagnostic(trimmed) {
            diagnostics.push(diag);
        } else if let Some(diag) = try_parse_bare_diagnostic(trimmed) {
            diagnostics.push(diag);
        }
    }

    diagnostics
}

/// Try to parse a diagnostic with file location: `File.kiev:10:5: error: message`
fn try_parse_located_diagnostic(line: &str) -> Option<Diagnostic> {
    let (location, rest) = split_file_location(line)?;
    let (severity, message) = parse_severity_message(rest)?;

    Some(Diagnostic {
        severity,
        message,
        file: Some(location.file),
        line: Some(location.line),
        column: location.column,
    })
}

struct FileLocation {
    file: String,
    line: u32,
    column: Option<u32>,
}

fn split_file_location(line: &str) -> Option<(FileLocation, &str)> {
    // Find the pattern: file.ext:line:col: or file.ext:line: followed by the
    // severity marker.
    for severity_prefix in &[": error:", ": warning:", ": info:"] {
        if let Some(pos) = line.find(severity_prefix) {
            let before = line.get(..pos)?;
            let after = line.get(pos + 2..)?; // skip ": "

            if let Some(loc) = parse_file_and_line(before) {
                return Some((loc, after));
            }
        }
    }
    None
}

fn parse_file_and_line(s: &str) -> Option<FileLocation> {
    // Try "file:line:col" first, then "file:line".
    let mut parts: Vec<&str> = s.rsplitn(3, ':').collect();
    parts.reverse();

    match parts.as_slice() {
        [file, line, col] => {
            if let (Ok(line_no), Ok(col_no)) = (line.parse::<u32>(), col.parse::<u32>()) {
                return Some(FileLocation {
                    file: (*file).to_owned(),
                    line: line_no,
                    column: Some(col_no),
                });
            }
            // The trailing number may be the line with a ':' inside the file name.
            let line_no: u32 = col.parse().ok()?;
            Some(FileLocation {
                file: format!("{file}:{line}"),
                line: line_no,
                column: None,
            })
        }
        [file, line] => {
            let line_no: u32 = line.parse().ok()?;
            Some(FileLocation {
                file: (*file).to_owned(),
                line: line_no,
                column: None,
            })
        }
        _ => None,
    }
}

/// Try to parse a bare diagnostic: `error: message` or `warning: message`
fn try_parse_bare_diagnostic(line: &str) -> Option<Diagnostic> {
    let (severity, message) = parse_severity_message(line)?;
    Some(Diagnostic {
        severity,
        message,
        file: None,
        line: None,
        column: None,
    })
}

fn parse_severity_message(s: &str) -> Option<(Severity, String)> {
    let prefixes = [
        ("error:", Severity::Error),
        ("warning:", Severity::Warning),
        ("info:", Severity::Info),
    ];

    prefixes.into_iter().find_map(|(prefix, severity)| {
        s.strip_prefix(prefix)
            .map(|msg| (severity, msg.trim().to_owned()))
    })
}
