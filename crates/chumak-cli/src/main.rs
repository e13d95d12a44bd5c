#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use chumak_engine::{BuildOptions, BuildOutcome, EngineError};
use chumak_kievc::KievcError;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "chumak", about = "A build orchestrator for the Kiev compiler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new Chumak project
    Init {
        /// Project name
        #[arg(long)]
        name: Option<String>,
    },
    /// Compile the project's source sets
    Build {
        /// Build only this source set (defaults to all)
        #[arg(long)]
        source_set: Option<String>,
        /// Force a recompile, ignoring the persisted state
        #[arg(long)]
        force: bool,
        /// Show raw compiler output
        #[arg(long, short = 'v')]
        verbose: bool,
    },
    /// Remove build outputs and state snapshots
    Clean,
    /// Check environment and toolchain setup
    Doctor,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Init { name } => cmd_init(name),
        Command::Build {
            source_set,
            force,
            verbose,
        } => cmd_build(source_set, force, verbose),
        Command::Clean => cmd_clean(),
        Command::Doctor => cmd_doctor(),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

/// Find the project root by looking for `chumak.toml` in the current directory.
fn project_root() -> Result<PathBuf, Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    let manifest = cwd.join("chumak.toml");
    if !manifest.exists() {
        return Err(
            "no chumak.toml found in current directory — run `chumak init` to create a project"
                .into(),
        );
    }
    Ok(cwd)
}

fn cmd_init(name: Option<String>) -> CliResult {
    let cwd = std::env::current_dir()?;

    let project_name = name.unwrap_or_else(|| {
        cwd.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("my-project")
            .to_owned()
    });

    let project_dir = cwd.join(&project_name);
    chumak_engine::init_project(&project_name, &project_dir)?;

    eprintln!(
        "    Created project `{project_name}` at {}",
        project_dir.display()
    );
    eprintln!();
    eprintln!("  To get started:");
    eprintln!("    cd {project_name}");
    eprintln!("    chumak build");
    Ok(())
}

fn cmd_build(source_set: Option<String>, force: bool, verbose: bool) -> CliResult {
    let root = project_root()?;
    let options = BuildOptions {
        source_set,
        force,
        verbose,
    };

    match chumak_engine::build(&root, &options) {
        Ok(summary) => {
            let compiled = summary
                .builds
                .iter()
                .filter(|b| b.outcome == BuildOutcome::Compiled)
                .count();
            let up_to_date = summary.builds.len() - compiled;
            eprintln!(
                "    Finished: {compiled} compiled, {up_to_date} up-to-date in {:.2}s",
                summary.duration.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            report_failure(&e);
            process::exit(1);
        }
    }
}

fn cmd_clean() -> CliResult {
    let root = project_root()?;
    chumak_engine::clean(&root)?;
    eprintln!("    Cleaned build outputs and state");
    Ok(())
}

fn cmd_doctor() -> CliResult {
    eprintln!("Checking environment...");
    eprintln!();

    let cwd = std::env::current_dir()?;
    let manifest_path = cwd.join("chumak.toml");
    let configured = if manifest_path.exists() {
        match chumak_config::Manifest::from_path(&manifest_path) {
            Ok(manifest) => {
                eprintln!("  [ok] Project: {}", manifest.package.name);
                eprintln!(
                    "  [ok] Source sets: {}",
                    manifest
                        .source_sets
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                manifest.toolchain.kievc
            }
            Err(e) => {
                eprintln!("  [!!] chumak.toml: {e}");
                None
            }
        }
    } else {
        eprintln!("  [--] No chumak.toml in current directory");
        None
    };

    match chumak_kievc::resolve_kievc(configured.as_deref()) {
        Ok(info) => {
            eprintln!("  [ok] kievc: {} ({})", info.version, info.path.display());
        }
        Err(e) => {
            eprintln!("  [!!] kievc: {e}");
        }
    }

    Ok(())
}

/// Print a build failure with messaging matched to its class: a broken
/// toolchain must never read like a source-code diagnostic.
fn report_failure(error: &EngineError) {
    match error {
        EngineError::CompileFailed { .. } | EngineError::WarningsRejected { .. } => {
            eprintln!("error: {error}");
        }
        EngineError::Kievc(
            kievc_error @ (KievcError::NotFound
            | KievcError::NotFoundAt { .. }
            | KievcError::NotExecutable { .. }
            | KievcError::Launch { .. }
            | KievcError::VersionParse { .. }
            | KievcError::Fingerprint { .. }),
        ) => {
            eprintln!("error: toolchain problem (not a source error): {kievc_error}");
        }
        EngineError::Kievc(timeout @ KievcError::Timeout { .. }) => {
            eprintln!("error: {timeout}");
        }
        other => eprintln!("error: {other}"),
    }
}
