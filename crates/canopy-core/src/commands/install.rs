//! Install command implementation.
//!
//! Builds the selected modules and installs them on one network with an
//! explicit lifecycle mode.

use crate::commands::context::{CommandContext, runtime};
use crate::error::CanopyError;
use crate::network::LOCAL_NETWORK;
use crate::orchestration::{BatchReport, BatchRequest};
use crate::types::{InstallMode, ModuleSelector};

/// Options for the install command
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Single module to install
    pub module: Option<String>,
    /// Install every configured module
    pub all: bool,
    pub mode: InstallMode,
    /// Upgrade even when the module hash did not change
    pub upgrade_unchanged: bool,
    pub network: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            module: None,
            all: false,
            mode: InstallMode::Install,
            upgrade_unchanged: false,
            network: LOCAL_NETWORK.to_string(),
        }
    }
}

impl InstallOptions {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn module(name: impl Into<String>) -> Self {
        Self {
            module: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
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

    /// `None` when neither a module nor `--all` was given.
    pub fn selector(&self) -> Option<ModuleSelector> {
        match (&self.module, self.all) {
            (Some(name), _) => Some(ModuleSelector::Named(name.clone())),
            (None, true) => Some(ModuleSelector::All),
            (None, false) => None,
        }
    }

    fn validate(&self) -> Result<(), CanopyError> {
        if self.module.is_some() && self.all {
            return Err(CanopyError::config(
                "Specify either a module name or --all, not both",
            ));
        }
        if self.selector().is_none() {
            return Err(CanopyError::config(
                "No module selected: specify a module name or use --all",
            ));
        }
        if self.mode == InstallMode::Auto {
            return Err(CanopyError::config(
                "install requires --mode install, reinstall or upgrade",
            ));
        }
        Ok(())
    }
}

/// Install command orchestrator
#[derive(Debug, Clone)]
pub struct InstallCommand {
    ctx: CommandContext,
}

impl InstallCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(CommandContext::with_defaults()?))
    }

    /// Execute the install command
    pub fn execute(&self, options: &InstallOptions) -> anyhow::Result<BatchReport> {
        // usage errors surface before the runtime or configuration are touched
        options.validate()?;
        runtime()?.block_on(self.execute_async(options))
    }

    pub async fn execute_async(&self, options: &InstallOptions) -> anyhow::Result<BatchReport> {
        options.validate()?;

        let config = self.ctx.load_config()?;
        let orchestrator = self.ctx.orchestrator(&config)?;
        let report = orchestrator
            .install(&BatchRequest {
                selector: options.selector(),
                network: options.network.clone(),
                mode: options.mode,
                upgrade_unchanged: options.upgrade_unchanged,
            })
            .await?;
        Ok(report)
    }
}
