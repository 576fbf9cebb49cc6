//! Producing module bytes for each source kind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::process::{ToolError, run_with_timeout};
use crate::types::{ModuleSpec, SourceKind};

/// Compilation target of rust modules.
pub const WASM_TARGET: &str = "wasm32-unknown-unknown";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to run '{program}': {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("Failed to compile the rust package: {package}")]
    Compile { package: String, diagnostics: String },

    #[error("Build output not found at {}: {source}", path.display())]
    MissingOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build output is empty: {}", .0.display())]
    EmptyOutput(PathBuf),
}

impl From<ToolError> for BuildError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Spawn { program, source } => BuildError::ToolSpawn { program, source },
            ToolError::Timeout { program, timeout } => BuildError::Timeout { program, timeout },
        }
    }
}

impl BuildError {
    /// Everything the toolchain said, verbatim when it said anything.
    pub fn diagnostics(&self) -> String {
        match self {
            BuildError::Compile {
                diagnostics,
                package,
            } if !diagnostics.trim().is_empty() => {
                format!("Failed to compile the rust package: {}\n{}", package, diagnostics)
            }
            other => other.to_string(),
        }
    }
}

/// Turns a module's source into wasm bytes.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, module: &ModuleSpec) -> Result<Vec<u8>, BuildError>;
}

/// Default compiler: `cargo` for rust modules, a file read for prebuilt ones.
///
/// Cargo holds a lock on the target directory, so rust builds run one at a
/// time. The timeout covers the build itself, not the wait for the lock.
#[derive(Debug, Clone)]
pub struct CargoCompiler {
    cargo: PathBuf,
    project_root: PathBuf,
    timeout: Duration,
    build_lock: Arc<Mutex<()>>,
}

impl CargoCompiler {
    pub fn new(project_root: PathBuf, timeout: Duration) -> Self {
        Self {
            cargo: PathBuf::from("cargo"),
            project_root,
            timeout,
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    #[cfg(test)]
    fn with_cargo(mut self, cargo: impl Into<PathBuf>) -> Self {
        self.cargo = cargo.into();
        self
    }

    async fn cargo_build(&self, package: &str) -> Result<Vec<u8>, BuildError> {
        let _build = self.build_lock.lock().await;

        let mut cargo = Command::new(&self.cargo);
        cargo
            .current_dir(&self.project_root)
            .arg("build")
            .arg("--target")
            .arg(WASM_TARGET)
            .arg("--release")
            .arg("-p")
            .arg(package)
            .arg("--locked");

        tracing::info!(
            "Executing: cargo build --target {} --release -p {} --locked",
            WASM_TARGET,
            package
        );

        let output = run_with_timeout(cargo, self.timeout).await?;
        if !output.status.success() {
            return Err(BuildError::Compile {
                package: package.to_string(),
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        read_output(&rust_output_path(&self.project_root, package)).await
    }
}

#[async_trait]
impl Compiler for CargoCompiler {
    async fn compile(&self, module: &ModuleSpec) -> Result<Vec<u8>, BuildError> {
        match &module.source {
            SourceKind::Rust { package } => self.cargo_build(package).await,
            SourceKind::Prebuilt { wasm } => read_output(&self.project_root.join(wasm)).await,
        }
    }
}

/// Where cargo leaves the wasm for `package`.
pub fn rust_output_path(project_root: &Path, package: &str) -> PathBuf {
    project_root
        .join("target")
        .join(WASM_TARGET)
        .join("release")
        .join(format!("{}.wasm", package.replace('-', "_")))
}

async fn read_output(path: &Path) -> Result<Vec<u8>, BuildError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| BuildError::MissingOutput {
            path: path.to_path_buf(),
            source,
        })?;
    if bytes.is_empty() {
        return Err(BuildError::EmptyOutput(path.to_path_buf()));
    }
    Ok(bytes)
}
