//! Applying install plans.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use super::planner::InstallPlan;
use crate::build::{BuildArtifact, ContentHash};
use crate::network::NetworkHandle;
use crate::platform::{
    InstallRequest, ModuleRecord, ModuleRegistry, ModuleState, Transport, TransportError,
};
use crate::report::Notice;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The platform accepted the code but the record could not be written.
    #[error("Failed to record module state: {0:#}")]
    Registry(anyhow::Error),
}

#[derive(Debug)]
pub enum ExecResult {
    Applied(ModuleRecord),
    /// Planner chose no-op; the installed hash is still current.
    Skipped(ContentHash),
    Failed(ExecError),
}

pub struct InstallExecutor {
    transport: Arc<dyn Transport>,
    registry: Arc<dyn ModuleRegistry>,
}

impl InstallExecutor {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<dyn ModuleRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<dyn ModuleRegistry> {
        &self.registry
    }

    /// Apply `plan` for `artifact` on `network`.
    ///
    /// The registry is written only after the transport confirmed the install.
    /// User-facing messages are appended to `notices`.
    pub async fn execute(
        &self,
        network: &NetworkHandle,
        plan: &InstallPlan,
        artifact: &BuildArtifact,
        current: Option<&ModuleRecord>,
        notices: &mut Vec<Notice>,
    ) -> ExecResult {
        let Some(mode) = plan.action.mode() else {
            let hash = artifact.hash().clone();
            notices.push(Notice::info(format!(
                "Module hash {} is already installed.",
                hash
            )));
            return ExecResult::Skipped(hash);
        };

        let module_id = match current {
            Some(record) => record.module_id.clone(),
            None => match self.transport.create_module(network, &plan.module).await {
                Ok(id) => id,
                Err(err) => return ExecResult::Failed(err.into()),
            },
        };

        notices.push(Notice::info(format!(
            "Installing code for module {}, with module id {}",
            plan.module, module_id
        )));

        let request = InstallRequest {
            module: &plan.module,
            module_id: &module_id,
            mode,
            wasm: artifact.bytes(),
            hash: artifact.hash(),
        };
        if let Err(err) = self.transport.install_code(network, request).await {
            tracing::warn!(
                module = %plan.module,
                network = %network,
                error = %err,
                "Install failed"
            );
            return ExecResult::Failed(err.into());
        }

        let record = ModuleRecord {
            name: plan.module.clone(),
            module_id,
            installed_hash: artifact.hash().clone(),
            state: ModuleState::Installed,
            mode,
            installed_at: Utc::now(),
        };
        if let Err(err) = self.registry.put(network.name(), record.clone()) {
            return ExecResult::Failed(ExecError::Registry(err));
        }

        tracing::info!(
            module = %plan.module,
            network = %network,
            action = %plan.action,
            hash = %record.installed_hash,
            "Module installed"
        );
        ExecResult::Applied(record)
    }
}

/// Keyed mutex table serializing install work per (module, network).
///
/// The guard is held across read-record, plan, execute and write-record.
#[derive(Debug, Default)]
pub struct InstallLocks {
    table: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl InstallLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, module: &str, network: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(
                table
                    .entry((module.to_string(), network.to_string()))
                    .or_default(),
            )
        };
        slot.lock_owned().await
    }
}
