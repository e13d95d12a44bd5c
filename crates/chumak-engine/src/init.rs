//! Project scaffolding for `chumak init`.

use std::collections::BTreeMap;
use std::path::Path;

use chumak_config::manifest::{
    CompilerOptions, Manifest, Package, SourceSetConfig, Toolchain,
};

use crate::error::EngineError;

/// Scaffold a new Chumak project.
///
/// Creates the project directory (if it doesn't exist), a `chumak.toml`
/// manifest with a `main` source set, and a `src/main/kiev/Main.kiev` with a
/// hello-world program.
///
/// # Errors
/// Returns an error if:
/// - A `chumak.toml` already exists in `dir`
/// - The directory or files cannot be created
/// - The manifest cannot be serialized
pub fn init_project(name: &str, dir: &Path) -> Result<(), EngineError> {
    let manifest_path = dir.join("chumak.toml");

    if manifest_path.exists() {
        return Err(EngineError::ProjectExists {
            path: manifest_path.display().to_string(),
        });
    }

    let src_dir = dir.join("src").join("main").join("kiev");
    chumak_util::fs::ensure_dir(&src_dir)?;

    let mut source_sets = BTreeMap::new();
    source_sets.insert(
        "main".to_owned(),
        SourceSetConfig {
            roots: vec!["src/main/kiev".into()],
            output: "build/classes/main".into(),
            classpath: Vec::new(),
        },
    );
    let manifest = Manifest {
        package: Package {
            name: name.to_owned(),
        },
        toolchain: Toolchain::default(),
        compiler: CompilerOptions::default(),
        source_sets,
    };
    let toml_content = manifest.to_toml()?;
    std::fs::write(&manifest_path, toml_content).map_err(|source| EngineError::Io {
        path: manifest_path.display().to_string(),
        source,
    })?;

    let source_path = src_dir.join("Main.kiev");
    let source_content = format!(
        "public class Main {{\n    public static void main(String[] args) {{\n        System.out.println(\"Hello from {name}!\");\n    }}\n}}\n"
    );
    std::fs::write(&source_path, source_content).map_err(|source| EngineError::Io {
        path: source_path.display().to_string(),
        source,
    })?;

    Ok(())
}
