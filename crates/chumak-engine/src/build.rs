//! Build orchestration: one strict sequential pipeline per source set —
//! registry lookup, classpath resolution, change detection, (conditional)
//! compiler invocation, output staging.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chumak_config::manifest::Manifest;
use chumak_config::snapshot::Snapshot;
use chumak_kievc::detect::{resolve_kievc, KievcInfo};
use chumak_kievc::invoke::{CompilerExecutor, KievcCommand, SubprocessExecutor};

use crate::classpath::{resolve_classpath, DependencyResolver, PathResolver};
use crate::error::EngineError;
use crate::incremental::{detect_changes, RecompileReason, Verdict};
use crate::source_set::SourceSetRegistry;
use crate::stage::{stage_fresh, stage_up_to_date, ArtifactSet};

/// Working directory for chumak's own files, under the project root.
const CHUMAK_DIR: &str = ".chumak";

/// Options controlling a build invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Build only this source set, or all registered sets when `None`.
    pub source_set: Option<String>,
    /// Force a recompile, ignoring the persisted state.
    pub force: bool,
    /// Show raw compiler output.
    pub verbose: bool,
}

/// Whether a source set was recompiled or already current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Inputs unchanged since the last successful compile; no process spawned.
    UpToDate,
    /// The compiler ran and its outputs were staged.
    Compiled,
}

/// Result of one source set's pipeline.
#[derive(Debug)]
pub struct SourceSetBuild {
    pub name: String,
    pub outcome: BuildOutcome,
    pub artifacts: ArtifactSet,
    pub duration: Duration,
}

/// Result of a whole build invocation.
#[derive(Debug)]
pub struct BuildSummary {
    pub builds: Vec<SourceSetBuild>,
    pub duration: Duration,
}

/// Run the build with the real dependency resolver and compiler process.
///
/// # Errors
/// Returns an error if configuration, resolution, toolchain detection,
/// compilation, or staging fails.
pub fn build(project_root: &Path, options: &BuildOptions) -> Result<BuildSummary, EngineError> {
    let resolver = PathResolver::new(project_root);
    build_with(project_root, options, &resolver, &SubprocessExecutor)
}

/// Run the build with explicit collaborators.
///
/// The dependency resolver and the compiler executor are the two external
/// boundaries of the pipeline; substituting them is how the orchestration
/// logic is tested without a real toolchain.
///
/// # Errors
/// Returns an error if any pipeline stage fails; `CompileFailed` is the one
/// expected failure (the compiler ran and the sources are at fault).
pub fn build_with(
    project_root: &Path,
    options: &BuildOptions,
    resolver: &dyn DependencyResolver,
    executor: &dyn CompilerExecutor,
) -> Result<BuildSummary, EngineError> {
    let start = Instant::now();

    // Configuration phase: manifest + source set registry. Failures here are
    // `ConfigurationError`-class and happen before any toolchain work.
    let manifest = Manifest::from_path(&project_root.join("chumak.toml"))?;
    let registry = SourceSetRegistry::from_manifest(project_root, &manifest)?;

    // Toolchain detection. A missing or broken compiler is an environment
    // problem, reported distinctly from any source diagnostic.
    let configured = manifest.toolchain.kievc.as_ref().map(|p| {
        if p.is_absolute() {
            p.clone()
        } else {
            project_root.join(p)
        }
    });
    let kievc = resolve_kievc(configured.as_deref())?;
    let timeout = manifest.toolchain.timeout_secs.map(Duration::from_secs);

    let selected: Vec<String> = match &options.source_set {
        Some(name) => {
            registry.resolve(name)?;
            vec![name.clone()]
        }
        None => registry.names(),
    };

    let mut builds = Vec::new();
    for name in &selected {
        builds.push(build_source_set(
            project_root,
            &manifest,
            &registry,
            name,
            &kievc,
            timeout,
            options,
            resolver,
            executor,
        )?);
    }

    Ok(BuildSummary {
        builds,
        duration: start.elapsed(),
    })
}

/// Run the pipeline for a single source set.
#[allow(clippy::too_many_arguments)]
fn build_source_set(
    project_root: &Path,
    manifest: &Manifest,
    registry: &SourceSetRegistry,
    name: &str,
    kievc: &KievcInfo,
    timeout: Option<Duration>,
    options: &BuildOptions,
    resolver: &dyn DependencyResolver,
    executor: &dyn CompilerExecutor,
) -> Result<SourceSetBuild, EngineError> {
    let start = Instant::now();
    let set = registry.resolve(name)?;
    let declarations = manifest
        .source_sets
        .get(name)
        .map(|config| config.classpath.clone())
        .unwrap_or_default();

    // 1. Classpath. Any resolution failure is fatal — no partial classpath.
    let classpath = resolve_classpath(&declarations, resolver)?;

    // 2. Source discovery.
    let sources = set.collect_sources(&manifest.compiler.extensions)?;
    if sources.is_empty() {
        let roots = set
            .roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(EngineError::NoSources { dir: roots });
    }

    // 3. Change detection against the persisted snapshot.
    let state_path = state_file_path(project_root, name);
    let snapshot = if options.force {
        None
    } else {
        Snapshot::load(&state_path)
    };
    let change = detect_changes(
        project_root,
        &sources,
        snapshot.as_ref(),
        &kievc.fingerprint,
        &classpath.fingerprint,
        &set.output_dir,
    )?;

    let reason = match change.verdict {
        Verdict::UpToDate => {
            // UpToDate is only ever produced from an existing snapshot.
            if let Some(snap) = &snapshot {
                eprintln!("    Up-to-date {name}");
                return Ok(SourceSetBuild {
                    name: name.to_owned(),
                    outcome: BuildOutcome::UpToDate,
                    artifacts: stage_up_to_date(set, snap),
                    duration: start.elapsed(),
                });
            }
            RecompileReason::NoPriorState
        }
        Verdict::Recompile(reason) => reason,
    };

    eprintln!(
        "    Compiling {name} ({reason}): {} file(s)",
        sources.len()
    );
    if manifest.compiler.list_files {
        for source in &sources {
            eprintln!("      {}", source.display());
        }
    }

    // 4. Invoke the compiler against a staging directory, so a failed compile
    //    leaves the previously staged outputs and snapshot untouched.
    let scratch = scratch_dir(project_root, name);
    chumak_util::fs::remove_dir_all_if_exists(&scratch)?;
    chumak_util::fs::ensure_dir(&scratch)?;

    let command = KievcCommand::new()
        .sources(&sources)
        .classpath(&classpath.paths())
        .dest(&scratch)
        .encoding(&manifest.compiler.encoding)
        .extra_args(&manifest.compiler.extra_args)
        .argfile_dir(&project_root.join(CHUMAK_DIR).join("tmp"));

    let outcome = match command.execute(kievc, executor, timeout) {
        Ok(outcome) => outcome,
        Err(e) => {
            let _ = chumak_util::fs::remove_dir_all_if_exists(&scratch);
            return Err(e.into());
        }
    };

    crate::diagnostics::print_diagnostics(&outcome, options.verbose);

    if !outcome.success {
        let _ = chumak_util::fs::remove_dir_all_if_exists(&scratch);
        return Err(EngineError::CompileFailed {
            error_count: outcome.error_count(),
        });
    }
    if manifest.compiler.fail_on_warning && outcome.warning_count() > 0 {
        let _ = chumak_util::fs::remove_dir_all_if_exists(&scratch);
        return Err(EngineError::WarningsRejected {
            warning_count: outcome.warning_count(),
        });
    }

    // 5. Stage outputs and persist the new state.
    let artifacts = stage_fresh(
        set,
        &scratch,
        change.current,
        &kievc.fingerprint,
        &classpath.fingerprint,
        &state_path,
    )?;

    eprintln!(
        "    Compiled {name}: {} output file(s)",
        artifacts.files.len()
    );

    Ok(SourceSetBuild {
        name: name.to_owned(),
        outcome: BuildOutcome::Compiled,
        artifacts,
        duration: start.elapsed(),
    })
}

/// Remove all build artifacts: every source set's output directory and the
/// `.chumak` working directory (state snapshots included).
///
/// # Errors
/// Returns an error if the manifest cannot be read or a directory cannot be
/// removed.
pub fn clean(project_root: &Path) -> Result<(), EngineError> {
    let manifest = Manifest::from_path(&project_root.join("chumak.toml"))?;
    for config in manifest.source_sets.values() {
        chumak_util::fs::remove_dir_all_if_exists(&project_root.join(&config.output))?;
    }
    chumak_util::fs::remove_dir_all_if_exists(&project_root.join(CHUMAK_DIR))?;
    Ok(())
}

/// The state snapshot file for one source set, keyed by set name so
/// independent sets never contend.
fn state_file_path(project_root: &Path, set_name: &str) -> PathBuf {
    project_root
        .join(CHUMAK_DIR)
        .join("state")
        .join(format!("{set_name}.toml"))
}

/// The staging directory the compiler writes into for one source set.
fn scratch_dir(project_root: &Path, set_name: &str) -> PathBuf {
    project_root
        .join(CHUMAK_DIR)
        .join("tmp")
        .join(format!("{set_name}-classes"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use chumak_kievc::error::KievcError;
    use chumak_util::process::CommandOutput;

    /// Plays the compiler: records every invocation, writes canned outputs
    /// into the `-d` directory, reports a canned exit status.
    struct FakeCompiler {
        calls: RefCell<Vec<Vec<String>>>,
        success: bool,
        stderr: String,
        emit: Vec<(String, String)>,
    }

    impl FakeCompiler {
        fn emitting(files: &[(&str, &str)]) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                success: true,
                stderr: String::new(),
                emit: files
                    .iter()
                    .map(|(p, c)| ((*p).to_owned(), (*c).to_owned()))
                    .collect(),
            }
        }

        fn failing(stderr: &str) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                success: false,
                stderr: stderr.to_owned(),
                emit: Vec::new(),
            }
        }

        fn warning(stderr: &str, files: &[(&str, &str)]) -> Self {
            let mut fake = Self::emitting(files);
            fake.stderr = stderr.to_owned();
            fake
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl CompilerExecutor for FakeCompiler {
        fn run(
            &self,
            _kievc: &KievcInfo,
            args: &[String],
            _timeout: Option<Duration>,
        ) -> Result<CommandOutput, KievcError> {
            self.calls.borrow_mut().push(args.to_vec());
            if self.success {
                let dest_pos = args.iter().position(|a| a == "-d").unwrap();
                let dest = PathBuf::from(args.get(dest_pos + 1).unwrap());
                for (relative, content) in &self.emit {
                    let path = dest.join(relative);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent).unwrap();
                    }
                    fs::write(path, content).unwrap();
                }
            }
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: self.stderr.clone(),
                success: self.success,
                exit_code: Some(if self.success { 0 } else { 1 }),
            })
        }
    }

    /// A fake `kievc` so toolchain detection succeeds against a real file.
    fn write_fake_kievc(dir: &Path) -> PathBuf {
        let path = dir.join("kievc");
        fs::write(&path, "#!/bin/sh\necho \"kievc 0.6.0\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn write_manifest(project: &Path, kievc: &Path, extra: &str) {
        fs::write(
            project.join("chumak.toml"),
            format!(
                r#"
[package]
name = "demo"

[toolchain]
kievc = "{}"
{extra}
[source-set.main]
roots = ["src/main/kiev"]
output = "build/classes/main"
"#,
                kievc.display()
            ),
        )
        .unwrap();
    }

    struct Project {
        tmp: tempfile::TempDir,
    }

    impl Project {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let kievc = write_fake_kievc(tmp.path());
            write_manifest(tmp.path(), &kievc, "");
            let src = tmp.path().join("src/main/kiev");
            fs::create_dir_all(&src).unwrap();
            fs::write(src.join("A.kiev"), "class A {}").unwrap();
            Self { tmp }
        }

        fn root(&self) -> &Path {
            self.tmp.path()
        }

        fn source(&self, name: &str) -> PathBuf {
            self.root().join("src/main/kiev").join(name)
        }

        fn state_file(&self) -> PathBuf {
            state_file_path(self.root(), "main")
        }

        fn output_dir(&self) -> PathBuf {
            self.root().join("build/classes/main")
        }

        fn build(&self, executor: &FakeCompiler) -> Result<BuildSummary, EngineError> {
            let resolver = PathResolver::new(self.root());
            build_with(self.root(), &BuildOptions::default(), &resolver, executor)
        }
    }

    #[test]
    fn first_build_compiles_and_stages() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);

        let summary = project.build(&compiler).unwrap();

        assert_eq!(compiler.call_count(), 1);
        let main = summary.builds.first().unwrap();
        assert_eq!(main.outcome, BuildOutcome::Compiled);
        assert_eq!(main.artifacts.files, vec![project.output_dir().join("A.class")]);
        assert!(project.output_dir().join("A.class").is_file());
        assert!(project.state_file().is_file());

        // The compiler saw the source file and a -d flag.
        let calls = compiler.calls.borrow();
        let args = calls.first().unwrap();
        assert!(args.first().unwrap().ends_with("A.kiev"));
        assert!(args.contains(&"-d".to_owned()));
    }

    #[test]
    fn second_build_is_up_to_date_with_zero_spawns() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);

        project.build(&compiler).unwrap();
        let summary = project.build(&compiler).unwrap();

        // Idempotence: no second compiler process.
        assert_eq!(compiler.call_count(), 1);
        let main = summary.builds.first().unwrap();
        assert_eq!(main.outcome, BuildOutcome::UpToDate);
        // The output set is re-exposed unchanged.
        assert_eq!(main.artifacts.files, vec![project.output_dir().join("A.class")]);
    }

    #[test]
    fn content_edit_forces_recompile() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);

        project.build(&compiler).unwrap();
        fs::write(project.source("A.kiev"), "class A { int x; }").unwrap();
        let summary = project.build(&compiler).unwrap();

        assert_eq!(compiler.call_count(), 2);
        assert_eq!(
            summary.builds.first().unwrap().outcome,
            BuildOutcome::Compiled
        );
    }

    #[test]
    fn timestamp_touch_does_not_recompile() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);

        project.build(&compiler).unwrap();
        // Rewrite identical bytes; only the mtime moves.
        fs::write(project.source("A.kiev"), "class A {}").unwrap();
        let summary = project.build(&compiler).unwrap();

        assert_eq!(compiler.call_count(), 1);
        assert_eq!(
            summary.builds.first().unwrap().outcome,
            BuildOutcome::UpToDate
        );
    }

    #[test]
    fn failed_compile_preserves_state_and_outputs() {
        let project = Project::new();
        let good = FakeCompiler::emitting(&[("A.class", "cafebabe")]);
        project.build(&good).unwrap();

        let state_before = fs::read(project.state_file()).unwrap();
        let output_before = fs::read(project.output_dir().join("A.class")).unwrap();

        // Edit the source so the pipeline recompiles, then fail the compile.
        fs::write(project.source("A.kiev"), "class A { broken").unwrap();
        let bad = FakeCompiler::failing("A.kiev:3:5: error: syntax error\n");
        let result = project.build(&bad);

        assert!(matches!(
            result,
            Err(EngineError::CompileFailed { error_count: 1 })
        ));
        // Failure isolation: snapshot and staged outputs are byte-identical.
        assert_eq!(fs::read(project.state_file()).unwrap(), state_before);
        assert_eq!(
            fs::read(project.output_dir().join("A.class")).unwrap(),
            output_before
        );
        // The staging directory was discarded.
        assert!(!scratch_dir(project.root(), "main").exists());
    }

    #[test]
    fn failed_first_build_writes_no_state() {
        let project = Project::new();
        let bad = FakeCompiler::failing("error: nope\n");

        let result = project.build(&bad);
        assert!(matches!(result, Err(EngineError::CompileFailed { .. })));
        assert!(!project.state_file().exists());

        // The next build retries the same work.
        let good = FakeCompiler::emitting(&[("A.class", "cafebabe")]);
        let summary = project.build(&good).unwrap();
        assert_eq!(
            summary.builds.first().unwrap().outcome,
            BuildOutcome::Compiled
        );
    }

    #[test]
    fn classpath_content_change_invalidates() {
        let project = Project::new();
        let libs = project.root().join("libs");
        fs::create_dir_all(&libs).unwrap();
        fs::write(libs.join("dep-1.0.jar"), b"v1").unwrap();

        let kievc = project.root().join("kievc");
        fs::write(
            project.root().join("chumak.toml"),
            format!(
                r#"
[package]
name = "demo"

[toolchain]
kievc = "{}"

[source-set.main]
roots = ["src/main/kiev"]
output = "build/classes/main"
classpath = ["libs/dep-1.0.jar"]
"#,
                kievc.display()
            ),
        )
        .unwrap();

        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);
        project.build(&compiler).unwrap();

        // No source change, but the jar is rebuilt in place.
        fs::write(libs.join("dep-1.0.jar"), b"v2").unwrap();
        let summary = project.build(&compiler).unwrap();

        assert_eq!(compiler.call_count(), 2);
        assert_eq!(
            summary.builds.first().unwrap().outcome,
            BuildOutcome::Compiled
        );

        // The jar is on the compiler command line.
        let calls = compiler.calls.borrow();
        let args = calls.first().unwrap();
        let cp_pos = args.iter().position(|a| a == "-classpath").unwrap();
        assert!(args.get(cp_pos + 1).unwrap().contains("dep-1.0.jar"));
    }

    #[test]
    fn force_flag_recompiles_without_changes() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);
        project.build(&compiler).unwrap();

        let resolver = PathResolver::new(project.root());
        let options = BuildOptions {
            force: true,
            ..BuildOptions::default()
        };
        let summary = build_with(project.root(), &options, &resolver, &compiler).unwrap();

        assert_eq!(compiler.call_count(), 2);
        assert_eq!(
            summary.builds.first().unwrap().outcome,
            BuildOutcome::Compiled
        );
    }

    #[test]
    fn deleted_outputs_trigger_recompile() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);
        project.build(&compiler).unwrap();

        fs::remove_dir_all(project.output_dir()).unwrap();
        let summary = project.build(&compiler).unwrap();

        assert_eq!(compiler.call_count(), 2);
        assert_eq!(
            summary.builds.first().unwrap().outcome,
            BuildOutcome::Compiled
        );
        assert!(project.output_dir().join("A.class").is_file());
    }

    #[test]
    fn stale_outputs_are_replaced_on_recompile() {
        let project = Project::new();
        let two_classes = FakeCompiler::emitting(&[("A.class", "a"), ("B.class", "b")]);
        project.build(&two_classes).unwrap();
        assert!(project.output_dir().join("B.class").is_file());

        // The edited source no longer produces B.class.
        fs::write(project.source("A.kiev"), "class A { int y; }").unwrap();
        let one_class = FakeCompiler::emitting(&[("A.class", "a2")]);
        let summary = project.build(&one_class).unwrap();

        assert!(!project.output_dir().join("B.class").exists());
        assert_eq!(
            summary.builds.first().unwrap().artifacts.files,
            vec![project.output_dir().join("A.class")]
        );
    }

    #[test]
    fn fail_on_warning_rejects_and_keeps_prior_state() {
        let project = Project::new();
        let kievc = project.root().join("kievc");
        write_manifest(
            project.root(),
            &kievc,
            "\n[compiler]\nfail_on_warning = true\n",
        );

        let warning = FakeCompiler::warning(
            "A.kiev:1:1: warning: deprecated construct\n",
            &[("A.class", "cafebabe")],
        );
        let result = project.build(&warning);

        assert!(matches!(
            result,
            Err(EngineError::WarningsRejected { warning_count: 1 })
        ));
        assert!(!project.state_file().exists());
        assert!(!scratch_dir(project.root(), "main").exists());
    }

    #[test]
    fn unknown_source_set_is_rejected_before_any_work() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[]);
        let resolver = PathResolver::new(project.root());
        let options = BuildOptions {
            source_set: Some("bench".to_owned()),
            ..BuildOptions::default()
        };

        let result = build_with(project.root(), &options, &resolver, &compiler);
        assert!(matches!(result, Err(EngineError::UnknownSourceSet { .. })));
        assert_eq!(compiler.call_count(), 0);
    }

    #[test]
    fn missing_dependency_fails_resolution() {
        let project = Project::new();
        let kievc = project.root().join("kievc");
        fs::write(
            project.root().join("chumak.toml"),
            format!(
                r#"
[package]
name = "demo"

[toolchain]
kievc = "{}"

[source-set.main]
roots = ["src/main/kiev"]
output = "build/classes/main"
classpath = ["libs/ghost.jar"]
"#,
                kievc.display()
            ),
        )
        .unwrap();

        let compiler = FakeCompiler::emitting(&[]);
        let result = project.build(&compiler);
        assert!(matches!(result, Err(EngineError::Resolution { .. })));
        assert_eq!(compiler.call_count(), 0);
    }

    #[test]
    fn empty_source_set_errors() {
        let project = Project::new();
        fs::remove_file(project.source("A.kiev")).unwrap();

        let compiler = FakeCompiler::emitting(&[]);
        let result = project.build(&compiler);
        assert!(matches!(result, Err(EngineError::NoSources { .. })));
    }

    #[test]
    fn clean_removes_outputs_and_state() {
        let project = Project::new();
        let compiler = FakeCompiler::emitting(&[("A.class", "cafebabe")]);
        project.build(&compiler).unwrap();

        clean(project.root()).unwrap();
        assert!(!project.output_dir().exists());
        assert!(!project.root().join(CHUMAK_DIR).exists());
    }

    #[test]
    fn extra_args_reach_the_compiler_verbatim() {
        let project = Project::new();
        let kievc = project.root().join("kievc");
        write_manifest(
            project.root(),
            &kievc,
            "\n[compiler]\nextra_args = [\"-no-btd\", \"-target\", \"8\"]\n",
        );

        let compiler = FakeCompiler::emitting(&[("A.class", "x")]);
        project.build(&compiler).unwrap();

        let calls = compiler.calls.borrow();
        let args = calls.first().unwrap();
        let pos = args.iter().position(|a| a == "-no-btd").unwrap();
        assert_eq!(args.get(pos + 1), Some(&"-target".to_owned()));
        assert_eq!(args.get(pos + 2), Some(&"8".to_owned()));
        // Encoding default is passed too.
        let enc_pos = args.iter().position(|a| a == "-encoding").unwrap();
        assert_eq!(args.get(enc_pos + 1), Some(&"UTF-8".to_owned()));
    }
}
