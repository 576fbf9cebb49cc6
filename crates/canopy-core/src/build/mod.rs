//! Build pipeline: compile, audit, hash.
//!
//! A module's audit and compilation run side by side; the audit never decides
//! whether the build succeeded.

pub mod compiler;
pub mod hash;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use futures::future::join_all;

use crate::audit::{AuditGate, AuditOutcome};
use crate::types::ModuleSpec;

pub use compiler::{BuildError, CargoCompiler, Compiler};
pub use hash::ContentHash;

/// Compiled output of one module. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    module: String,
    bytes: Arc<[u8]>,
    hash: ContentHash,
}

impl BuildArtifact {
    pub fn new(module: impl Into<String>, bytes: Vec<u8>) -> Self {
        let hash = ContentHash::of(&bytes);
        Self {
            module: module.into(),
            bytes: bytes.into(),
            hash,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }
}

#[derive(Debug)]
pub enum BuildResult {
    Built {
        artifact: BuildArtifact,
        audit: AuditOutcome,
    },
    BuildFailed {
        module: String,
        error: BuildError,
        audit: AuditOutcome,
    },
}

impl BuildResult {
    pub fn module(&self) -> &str {
        match self {
            BuildResult::Built { artifact, .. } => artifact.module(),
            BuildResult::BuildFailed { module, .. } => module,
        }
    }

    pub fn audit(&self) -> &AuditOutcome {
        match self {
            BuildResult::Built { audit, .. } | BuildResult::BuildFailed { audit, .. } => audit,
        }
    }

    pub fn artifact(&self) -> Option<&BuildArtifact> {
        match self {
            BuildResult::Built { artifact, .. } => Some(artifact),
            BuildResult::BuildFailed { .. } => None,
        }
    }

    /// Compiler output for a failed build.
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            BuildResult::Built { .. } => None,
            BuildResult::BuildFailed { error, .. } => Some(error.diagnostics()),
        }
    }
}

#[derive(Clone)]
pub struct BuildPipeline {
    compiler: Arc<dyn Compiler>,
    audit: AuditGate,
}

impl BuildPipeline {
    pub fn new(compiler: Arc<dyn Compiler>, audit: AuditGate) -> Self {
        Self { compiler, audit }
    }

    pub async fn build(&self, module: &ModuleSpec) -> BuildResult {
        tracing::info!(module = %module.name, "Building module");

        let (audit, compiled) =
            futures::join!(self.audit.audit(module), self.compiler.compile(module));

        match compiled {
            Ok(bytes) => {
                let artifact = BuildArtifact::new(&module.name, bytes);
                tracing::info!(
                    module = %module.name,
                    hash = %artifact.hash(),
                    size = artifact.bytes().len(),
                    "Build finished"
                );
                BuildResult::Built { artifact, audit }
            }
            Err(error) => {
                tracing::warn!(module = %module.name, error = %error, "Build failed");
                BuildResult::BuildFailed {
                    module: module.name.clone(),
                    error,
                    audit,
                }
            }
        }
    }

    /// Build every module concurrently. Results keep the order of `modules`.
    pub async fn build_all(&self, modules: &[ModuleSpec]) -> Vec<BuildResult> {
        join_all(modules.iter().map(|module| self.build(module))).await
    }

    /// Write `<output_dir>/<name>/<name>.wasm` and its `.sha256` sidecar.
    pub fn persist(artifact: &BuildArtifact, output_dir: &Path) -> anyhow::Result<PathBuf> {
        let dir = output_dir.join(artifact.module());
        let wasm_path = dir.join(format!("{}.wasm", artifact.module()));
        let hash_path = dir.join(format!("{}.wasm.sha256", artifact.module()));

        crate::fs::write_atomic(&wasm_path, artifact.bytes())
            .with_context(|| format!("Failed to persist module '{}'", artifact.module()))?;
        crate::fs::write_atomic(&hash_path, format!("{}\n", artifact.hash()).as_bytes())?;

        tracing::debug!(
            module = artifact.module(),
            path = %wasm_path.display(),
            "Artifact written"
        );
        Ok(wasm_path)
    }
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditCapability;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Emits the module name as bytes, fails for names starting with `broken`.
    struct EchoCompiler {
        delay: Duration,
    }

    #[async_trait]
    impl Compiler for EchoCompiler {
        async fn compile(&self, module: &ModuleSpec) -> Result<Vec<u8>, BuildError> {
            tokio::time::sleep(self.delay).await;
            if module.name.starts_with("broken") {
                return Err(BuildError::Compile {
                    package: module.name.clone(),
                    diagnostics: "error: expected one of `;` or `}`".to_string(),
                });
            }
            Ok(module.name.as_bytes().to_vec())
        }
    }

    fn pipeline(delay: Duration) -> BuildPipeline {
        BuildPipeline::new(
            Arc::new(EchoCompiler { delay }),
            AuditGate::new(AuditCapability::unavailable("cargo-audit")),
        )
    }

    #[tokio::test]
    async fn successful_build_hashes_output() {
        let result = pipeline(Duration::ZERO)
            .build(&ModuleSpec::rust("hello", "hello"))
            .await;

        let artifact = result.artifact().unwrap();
        assert_eq!(artifact.bytes(), b"hello");
        assert_eq!(artifact.hash(), &ContentHash::of(b"hello"));
        assert!(matches!(
            result.audit(),
            AuditOutcome::ToolUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn failed_build_keeps_diagnostics() {
        let result = pipeline(Duration::ZERO)
            .build(&ModuleSpec::rust("broken", "broken"))
            .await;

        assert!(result.artifact().is_none());
        assert!(
            result
                .diagnostics()
                .unwrap()
                .contains("error: expected one of `;` or `}`")
        );
    }

    #[tokio::test]
    async fn build_all_preserves_selection_order() {
        let modules = vec![
            ModuleSpec::rust("zeta", "zeta"),
            ModuleSpec::rust("broken_alpha", "broken_alpha"),
            ModuleSpec::rust("mid", "mid"),
        ];
        let results = pipeline(Duration::from_millis(10))
            .build_all(&modules)
            .await;

        let names: Vec<_> = results.iter().map(BuildResult::module).collect();
        assert_eq!(names, vec!["zeta", "broken_alpha", "mid"]);
        assert!(results[1].artifact().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn builds_overlap() {
        let modules: Vec<_> = (0..4)
            .map(|i| ModuleSpec::rust(format!("m{i}"), format!("m{i}")))
            .collect();
        let started = tokio::time::Instant::now();
        pipeline(Duration::from_secs(10)).build_all(&modules).await;
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn persist_writes_wasm_and_hash() {
        let temp = TempDir::new().unwrap();
        let artifact = BuildArtifact::new("hello", b"\0asm".to_vec());

        let path = BuildPipeline::persist(&artifact, temp.path()).unwrap();

        assert_eq!(path, temp.path().join("hello/hello.wasm"));
        assert_eq!(std::fs::read(&path).unwrap(), b"\0asm");
        let sidecar = std::fs::read_to_string(temp.path().join("hello/hello.wasm.sha256")).unwrap();
        assert_eq!(sidecar.trim(), artifact.hash().as_str());
    }
}
