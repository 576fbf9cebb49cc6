//! Batch driver: select, resolve, build, then plan and install per module.
//!
//! Every selected module is attempted exactly once. A failure is recorded in
//! that module's report and never stops its siblings.

pub mod report;

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;

use crate::build::{BuildPipeline, BuildResult};
use crate::error::CanopyError;
use crate::install::{ExecResult, InstallExecutor, InstallLocks, plan};
use crate::network::{NetworkHandle, NetworkResolver};
use crate::report::Notice;
use crate::types::{InstallMode, ModuleSelector, ModuleSpec};

pub use report::{BatchReport, ModuleReport, ModuleStatus};

/// One `install` or `deploy` invocation.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// `None` when neither a module nor `--all` was given.
    pub selector: Option<ModuleSelector>,
    pub network: String,
    pub mode: InstallMode,
    pub upgrade_unchanged: bool,
}

pub struct Orchestrator {
    modules: Vec<ModuleSpec>,
    resolver: NetworkResolver,
    pipeline: BuildPipeline,
    executor: InstallExecutor,
    locks: Arc<InstallLocks>,
}

impl Orchestrator {
    pub fn new(
        modules: Vec<ModuleSpec>,
        resolver: NetworkResolver,
        pipeline: BuildPipeline,
        executor: InstallExecutor,
    ) -> Self {
        Self {
            modules,
            resolver,
            pipeline,
            executor,
            locks: Arc::new(InstallLocks::new()),
        }
    }

    /// Share a lock table with other orchestrators in the same process.
    pub fn with_locks(mut self, locks: Arc<InstallLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Turn a selector into the modules to process, in configuration order.
    pub fn select(
        &self,
        selector: Option<&ModuleSelector>,
    ) -> Result<Vec<ModuleSpec>, CanopyError> {
        match selector {
            None => Err(CanopyError::config(
                "No module selected: specify a module name or use --all",
            )),
            Some(ModuleSelector::All) => Ok(self.modules.clone()),
            Some(ModuleSelector::Named(name)) => self
                .modules
                .iter()
                .find(|module| &module.name == name)
                .cloned()
                .map(|module| vec![module])
                .ok_or_else(|| {
                    CanopyError::config(format!(
                        "Module '{}' is not defined in canopy.toml",
                        name
                    ))
                }),
        }
    }

    /// Build every selected module without installing.
    ///
    /// Artifacts are written below `output_dir` when one is given.
    pub async fn build(
        &self,
        selector: &ModuleSelector,
        output_dir: Option<PathBuf>,
    ) -> Result<BatchReport, CanopyError> {
        let modules = self.select(Some(selector))?;
        let results = self.pipeline.build_all(&modules).await;

        let reports = results
            .into_iter()
            .map(|result| {
                let mut notices = result.audit().notices();
                let status = match &result {
                    BuildResult::Built { artifact, .. } => {
                        match output_dir
                            .as_deref()
                            .map(|dir| BuildPipeline::persist(artifact, dir))
                        {
                            Some(Err(err)) => ModuleStatus::BuildFailed {
                                diagnostics: format!("{:#}", err),
                            },
                            _ => ModuleStatus::Built {
                                hash: artifact.hash().clone(),
                            },
                        }
                    }
                    BuildResult::BuildFailed { error, .. } => ModuleStatus::BuildFailed {
                        diagnostics: error.diagnostics(),
                    },
                };
                if let ModuleStatus::BuildFailed { diagnostics } = &status {
                    notices.push(Notice::error(diagnostics.clone()));
                }
                ModuleReport::new(result.module(), status, notices)
            })
            .collect();

        Ok(BatchReport::new(None, reports))
    }

    /// Build and install the selected modules on `request.network`.
    ///
    /// Fails before any build when the selector is missing or the network is
    /// unknown; everything after that is reported per module.
    pub async fn install(&self, request: &BatchRequest) -> Result<BatchReport, CanopyError> {
        let modules = self.select(request.selector.as_ref())?;
        let network = self.resolver.resolve(&request.network)?;
        tracing::info!(
            network = %network,
            ephemeral = network.is_ephemeral(),
            modules = modules.len(),
            mode = %request.mode,
            "Starting install batch"
        );

        let results = self.pipeline.build_all(&modules).await;
        let reports = join_all(
            results
                .into_iter()
                .map(|result| self.install_built(&network, result, request)),
        )
        .await;

        let report = BatchReport::new(Some(network.name().to_string()), reports);
        tracing::info!(
            network = %network,
            failed = report.failed().count(),
            "Install batch finished"
        );
        Ok(report)
    }

    async fn install_built(
        &self,
        network: &NetworkHandle,
        result: BuildResult,
        request: &BatchRequest,
    ) -> ModuleReport {
        let mut notices = result.audit().notices();

        let artifact = match result {
            BuildResult::Built { artifact, .. } => artifact,
            BuildResult::BuildFailed { module, error, .. } => {
                let diagnostics = error.diagnostics();
                notices.push(Notice::error(diagnostics.clone()));
                let status = ModuleStatus::BuildFailed { diagnostics };
                return ModuleReport::new(module, status, notices);
            }
        };
        let name = artifact.module().to_string();

        let _guard = self.locks.acquire(&name, network.name()).await;

        let current = match self.executor.registry().get(network.name(), &name) {
            Ok(current) => current,
            Err(err) => {
                let reason = format!("{:#}", err);
                notices.push(Notice::error(reason.clone()));
                return ModuleReport::new(name, ModuleStatus::InstallFailed { reason }, notices);
            }
        };

        let plan = match plan(
            &name,
            request.mode,
            request.upgrade_unchanged,
            current.as_ref(),
            artifact.hash(),
        ) {
            Ok(plan) => plan,
            Err(err) => {
                let reason = err.to_string();
                notices.push(Notice::error(reason.clone()));
                return ModuleReport::new(name, ModuleStatus::Rejected { reason }, notices);
            }
        };

        let status = match self
            .executor
            .execute(network, &plan, &artifact, current.as_ref(), &mut notices)
            .await
        {
            ExecResult::Applied(record) => ModuleStatus::Installed {
                action: plan.action,
                module_id: record.module_id,
                hash: record.installed_hash,
            },
            ExecResult::Skipped(hash) => ModuleStatus::Unchanged {
                hash,
                reason: plan.reason,
            },
            ExecResult::Failed(err) => {
                let reason = err.to_string();
                notices.push(Notice::error(reason.clone()));
                ModuleStatus::InstallFailed { reason }
            }
        };

        ModuleReport::new(name, status, notices)
    }
}
