//! Deploy command implementation.
//!
//! Builds, then installs or upgrades depending on what is already recorded.
//! Only a single named module may be force-reinstalled.

use crate::commands::context::{CommandContext, runtime};
use crate::error::CanopyError;
use crate::network::LOCAL_NETWORK;
use crate::orchestration::{BatchReport, BatchRequest};
use crate::types::{InstallMode, ModuleSelector};

#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Deploy one module; every configured module when `None`
    pub module: Option<String>,
    /// `Some(Reinstall)` to force a reinstall
    pub mode: Option<InstallMode>,
    pub upgrade_unchanged: bool,
    pub network: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            module: None,
            mode: None,
            upgrade_unchanged: false,
            network: LOCAL_NETWORK.to_string(),
        }
    }
}

impl DeployOptions {
    pub fn module(name: impl Into<String>) -> Self {
        Self {
            module: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_upgrade_unchanged(mut self, upgrade_unchanged: bool) -> Self {
        self.upgrade_unchanged = upgrade_unchanged;
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Mode handed to the planner.
    fn effective_mode(&self) -> Result<InstallMode, CanopyError> {
        match (self.mode, &self.module) {
            (None | Some(InstallMode::Auto), _) => Ok(InstallMode::Auto),
            (Some(InstallMode::Reinstall), Some(_)) => Ok(InstallMode::Reinstall),
            (Some(InstallMode::Reinstall), None) => Err(CanopyError::config(
                "--mode reinstall requires a module name",
            )),
            (Some(other), _) => Err(CanopyError::config(format!(
                "deploy does not support --mode {}; only 'reinstall' is allowed",
                other
            ))),
        }
    }

    fn request(&self) -> Result<BatchRequest, CanopyError> {
        Ok(BatchRequest {
            selector: Some(match &self.module {
                Some(name) => ModuleSelector::Named(name.clone()),
                None => ModuleSelector::All,
            }),
            network: self.network.clone(),
            mode: self.effective_mode()?,
            upgrade_unchanged: self.upgrade_unchanged,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeployCommand {
    ctx: CommandContext,
}

impl DeployCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(CommandContext::with_defaults()?))
    }

    pub fn execute(&self, options: &DeployOptions) -> anyhow::Result<BatchReport> {
        options.request()?;
        runtime()?.block_on(self.execute_async(options))
    }

    pub async fn execute_async(&self, options: &DeployOptions) -> anyhow::Result<BatchReport> {
        let request = options.request()?;
        let config = self.ctx.load_config()?;
        let orchestrator = self.ctx.orchestrator(&config)?;
        Ok(orchestrator.install(&request).await?)
    }
}
