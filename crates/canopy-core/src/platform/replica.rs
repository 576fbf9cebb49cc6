//! Filesystem replica reached through `file://` providers.
//!
//! Each module is a metadata file plus the installed wasm:
//!
//! ```text
//! <replica>/modules/<module_id>.json
//! <replica>/modules/<module_id>.wasm
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InstallRequest, ModuleId, Transport, TransportError};
use crate::build::ContentHash;
use crate::network::NetworkHandle;
use crate::types::InstallMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReplicaModule {
    name: String,
    module_id: ModuleId,
    #[serde(default)]
    module_hash: Option<ContentHash>,
    #[serde(default)]
    last_mode: Option<InstallMode>,
    updated_at: DateTime<Utc>,
}

/// [`Transport`] for networks whose primary provider is a `file://` URL.
///
/// Other schemes fail with [`TransportError::UnsupportedProvider`].
#[derive(Debug, Clone, Default)]
pub struct ReplicaTransport;

impl ReplicaTransport {
    pub fn new() -> Self {
        Self
    }

    fn modules_dir(network: &NetworkHandle) -> Result<PathBuf, TransportError> {
        let unsupported = |scheme: &str| TransportError::UnsupportedProvider {
            network: network.name().to_string(),
            scheme: scheme.to_string(),
        };
        let provider = network.primary_provider().ok_or_else(|| unsupported("<none>"))?;
        if provider.scheme() != "file" {
            return Err(unsupported(provider.scheme()));
        }
        let root = provider
            .to_file_path()
            .map_err(|_| unsupported(provider.scheme()))?;
        Ok(root.join("modules"))
    }

    async fn read_module(
        dir: &Path,
        module_id: &ModuleId,
    ) -> Result<Option<ReplicaModule>, TransportError> {
        let path = dir.join(format!("{}.json", module_id));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(TransportError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|err| TransportError::Io {
            path,
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        })
    }

    async fn write_module(dir: &Path, module: &ReplicaModule) -> Result<(), TransportError> {
        let path = dir.join(format!("{}.json", module.module_id));
        let bytes = serde_json::to_vec_pretty(module).map_err(|err| TransportError::Io {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
        })?;
        write_file(&path, &bytes).await
    }
}

/// Deterministic module id for `name` within one replica.
pub fn replica_module_id(name: &str) -> ModuleId {
    let hex = blake3::hash(name.as_bytes()).to_hex();
    let groups: Vec<&str> = (0..5).map(|i| &hex.as_str()[i * 5..i * 5 + 5]).collect();
    ModuleId::new(groups.join("-"))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TransportError> {
    let io_err = |source| TransportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }
    let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

#[async_trait]
impl Transport for ReplicaTransport {
    async fn create_module(
        &self,
        network: &NetworkHandle,
        module: &str,
    ) -> Result<ModuleId, TransportError> {
        let dir = Self::modules_dir(network)?;
        let module_id = replica_module_id(module);

        if Self::read_module(&dir, &module_id).await?.is_some() {
            tracing::debug!(module, %module_id, "Module already exists on replica");
            return Ok(module_id);
        }

        Self::write_module(
            &dir,
            &ReplicaModule {
                name: module.to_string(),
                module_id: module_id.clone(),
                module_hash: None,
                last_mode: None,
                updated_at: Utc::now(),
            },
        )
        .await?;
        tracing::info!(module, %module_id, network = %network, "Created module");
        Ok(module_id)
    }

    async fn install_code(
        &self,
        network: &NetworkHandle,
        request: InstallRequest<'_>,
    ) -> Result<(), TransportError> {
        let dir = Self::modules_dir(network)?;
        let mut module = Self::read_module(&dir, request.module_id)
            .await?
            .ok_or_else(|| TransportError::UnknownModule(request.module_id.clone()))?;

        let rejected = |reason: &str| TransportError::Rejected {
            module_id: request.module_id.clone(),
            mode: request.mode,
            reason: reason.to_string(),
        };
        match (request.mode, &module.module_hash) {
            (InstallMode::Install, Some(_)) => {
                return Err(rejected("code is already installed"));
            }
            (InstallMode::Upgrade, None) => {
                return Err(rejected("no code is installed to upgrade"));
            }
            (InstallMode::Auto, _) => {
                return Err(rejected("mode must be resolved before install"));
            }
            _ => {}
        }

        write_file(&dir.join(format!("{}.wasm", request.module_id)), request.wasm).await?;

        module.module_hash = Some(request.hash.clone());
        module.last_mode = Some(request.mode);
        module.updated_at = Utc::now();
        Self::write_module(&dir, &module).await
    }
}
