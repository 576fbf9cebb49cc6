//! Aggregated per-module results of a command.

use serde::Serialize;

use crate::build::ContentHash;
use crate::install::PlanAction;
use crate::platform::ModuleId;
use crate::report::Notice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Built only (`build` command).
    Built { hash: ContentHash },
    Installed {
        action: PlanAction,
        module_id: ModuleId,
        hash: ContentHash,
    },
    Unchanged { hash: ContentHash, reason: String },
    BuildFailed { diagnostics: String },
    /// The planner refused the requested mode.
    Rejected { reason: String },
    InstallFailed { reason: String },
}

impl ModuleStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ModuleStatus::BuildFailed { .. }
                | ModuleStatus::Rejected { .. }
                | ModuleStatus::InstallFailed { .. }
        )
    }

    /// Short label for table output.
    pub fn label(&self) -> &'static str {
        match self {
            ModuleStatus::Built { .. } => "built",
            ModuleStatus::Installed { .. } => "installed",
            ModuleStatus::Unchanged { .. } => "unchanged",
            ModuleStatus::BuildFailed { .. } => "build failed",
            ModuleStatus::Rejected { .. } => "rejected",
            ModuleStatus::InstallFailed { .. } => "install failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub name: String,
    #[serde(flatten)]
    pub status: ModuleStatus,
    pub notices: Vec<Notice>,
}

impl ModuleReport {
    pub fn new(name: impl Into<String>, status: ModuleStatus, notices: Vec<Notice>) -> Self {
        Self {
            name: name.into(),
            status,
            notices,
        }
    }

    pub fn failed(&self) -> bool {
        self.status.is_failure()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// `None` for build-only commands.
    pub network: Option<String>,
    pub modules: Vec<ModuleReport>,
}

impl BatchReport {
    pub fn new(network: Option<String>, modules: Vec<ModuleReport>) -> Self {
        Self { network, modules }
    }

    /// True if any module failed. Drives the process exit status.
    pub fn has_failures(&self) -> bool {
        self.modules.iter().any(ModuleReport::failed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ModuleReport> {
        self.modules.iter().filter(|module| module.failed())
    }

    pub fn module(&self, name: &str) -> Option<&ModuleReport> {
        self.modules.iter().find(|module| module.name == name)
    }
}
