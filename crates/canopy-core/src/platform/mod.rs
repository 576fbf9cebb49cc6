//! Execution platform interfaces: recorded module state and the transport that
//! pushes code.

pub mod replica;
pub mod state_store;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::build::ContentHash;
use crate::network::NetworkHandle;
use crate::types::InstallMode;

pub use replica::ReplicaTransport;
pub use state_store::StateStore;

/// Platform-assigned module identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Installed,
}

/// What is known to be running for a module on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub module_id: ModuleId,
    pub installed_hash: ContentHash,
    pub state: ModuleState,
    /// Action that produced this record.
    pub mode: InstallMode,
    pub installed_at: DateTime<Utc>,
}

/// Persistent view of module records, keyed by network then module name.
///
/// Only the install executor writes, and only after the platform confirmed
/// the action.
pub trait ModuleRegistry: Send + Sync {
    fn get(&self, network: &str, module: &str) -> anyhow::Result<Option<ModuleRecord>>;

    fn put(&self, network: &str, record: ModuleRecord) -> anyhow::Result<()>;

    /// All records for `network`, sorted by module name.
    fn list(&self, network: &str) -> anyhow::Result<Vec<ModuleRecord>>;
}

/// Registry that lives for one process. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: Mutex<BTreeMap<String, BTreeMap<String, ModuleRecord>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> anyhow::Result<std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, ModuleRecord>>>>
    {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("Module registry lock poisoned"))
    }
}

impl ModuleRegistry for MemoryRegistry {
    fn get(&self, network: &str, module: &str) -> anyhow::Result<Option<ModuleRecord>> {
        Ok(self
            .lock()?
            .get(network)
            .and_then(|records| records.get(module))
            .cloned())
    }

    fn put(&self, network: &str, record: ModuleRecord) -> anyhow::Result<()> {
        self.lock()?
            .entry(network.to_string())
            .or_default()
            .insert(record.name.clone(), record);
        Ok(())
    }

    fn list(&self, network: &str) -> anyhow::Result<Vec<ModuleRecord>> {
        Ok(self
            .lock()?
            .get(network)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Code push for one module.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    pub module: &'a str,
    pub module_id: &'a ModuleId,
    /// `Install`, `Reinstall` or `Upgrade`.
    pub mode: InstallMode,
    pub wasm: &'a [u8],
    pub hash: &'a ContentHash,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Unsupported provider scheme '{scheme}' for network '{network}'")]
    UnsupportedProvider { network: String, scheme: String },

    #[error("Module {0} does not exist on the network")]
    UnknownModule(ModuleId),

    #[error("Module {module_id} rejected {mode}: {reason}")]
    Rejected {
        module_id: ModuleId,
        mode: InstallMode,
        reason: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Wire access to the execution platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Allocate a new module on the network and return its id.
    async fn create_module(
        &self,
        network: &NetworkHandle,
        module: &str,
    ) -> Result<ModuleId, TransportError>;

    async fn install_code(
        &self,
        network: &NetworkHandle,
        request: InstallRequest<'_>,
    ) -> Result<(), TransportError>;
}
