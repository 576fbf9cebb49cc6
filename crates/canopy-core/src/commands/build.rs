//! Build command implementation.

use crate::commands::context::{CommandContext, runtime};
use crate::orchestration::BatchReport;
use crate::types::ModuleSelector;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Compile and audit without writing artifacts
    pub check: bool,
}

impl BuildOptions {
    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BuildCommand {
    ctx: CommandContext,
}

impl BuildCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(CommandContext::with_defaults()?))
    }

    /// Build every configured module. Audit findings never fail the build.
    pub fn execute(&self, options: &BuildOptions) -> anyhow::Result<BatchReport> {
        runtime()?.block_on(self.execute_async(options))
    }

    pub async fn execute_async(&self, options: &BuildOptions) -> anyhow::Result<BatchReport> {
        let config = self.ctx.load_config()?;
        let output_dir = (!options.check).then(|| self.ctx.output_dir(&config));
        let orchestrator = self.ctx.orchestrator(&config)?;
        Ok(orchestrator.build(&ModuleSelector::All, output_dir).await?)
    }
}
