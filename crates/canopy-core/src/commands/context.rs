//! Command context providing dependency injection for commands.
//!
//! Holds the project and state paths and wires the default adapters (cargo
//! compiler, cargo-audit, filesystem replica, JSON state store) into an
//! [`Orchestrator`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audit::{AuditCapability, AuditGate, CargoAudit};
use crate::build::{BuildPipeline, CargoCompiler};
use crate::config::{CanopyConfig, ConfigStore};
use crate::install::InstallExecutor;
use crate::network::NetworkResolver;
use crate::orchestration::Orchestrator;
use crate::platform::{ReplicaTransport, StateStore};

#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Directory containing `canopy.toml`
    project_root: PathBuf,
    /// State directory holding module records
    state_dir: PathBuf,
}

impl CommandContext {
    pub fn new(project_root: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            project_root,
            state_dir,
        }
    }

    /// Current directory and the user's state directory.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let project_root = std::env::current_dir()?;
        Ok(Self::new(project_root, StateStore::default_state_dir()?))
    }

    /// Explicit project root (made absolute) and the user's state directory.
    pub fn with_project_root(project_root: &Path) -> anyhow::Result<Self> {
        let project_root = if project_root.is_absolute() {
            project_root.to_path_buf()
        } else {
            std::env::current_dir()?.join(project_root)
        };
        Ok(Self::new(project_root, StateStore::default_state_dir()?))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::from_project_root(self.project_root.clone())
    }

    pub fn load_config(&self) -> anyhow::Result<CanopyConfig> {
        self.config_store().load()
    }

    pub fn registry(&self) -> Arc<StateStore> {
        Arc::new(StateStore::new(&self.state_dir, &self.project_root))
    }

    pub fn resolver(&self, config: &CanopyConfig) -> anyhow::Result<NetworkResolver> {
        NetworkResolver::from_config(&self.project_root, config)
    }

    pub fn output_dir(&self, config: &CanopyConfig) -> PathBuf {
        self.project_root.join(&config.build.output_dir)
    }

    /// Orchestrator backed by the default host adapters.
    ///
    /// `cargo audit` is probed on the first audited module, not here.
    pub fn orchestrator(&self, config: &CanopyConfig) -> anyhow::Result<Orchestrator> {
        let audit = AuditCapability::available(CargoAudit::new(
            self.project_root.clone(),
            config.build.audit_timeout(),
        ));

        let pipeline = BuildPipeline::new(
            Arc::new(CargoCompiler::new(
                self.project_root.clone(),
                config.build.build_timeout(),
            )),
            AuditGate::new(audit),
        );
        let executor = InstallExecutor::new(Arc::new(ReplicaTransport::new()), self.registry());

        Ok(Orchestrator::new(
            config.module_specs(),
            self.resolver(config)?,
            pipeline,
            executor,
        ))
    }
}

/// Runtime for driving async work from the synchronous command API.
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))
}
