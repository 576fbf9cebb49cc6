//! Module records persisted in the user's state directory.
//!
//! Records are stored outside the project so deploy bookkeeping never shows up
//! in the project's working tree.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{ModuleRecord, ModuleRegistry};

const RECORDS_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordsFile {
    version: u32,
    /// network -> module name -> record
    #[serde(default)]
    networks: BTreeMap<String, BTreeMap<String, ModuleRecord>>,
}

/// JSON-file backed [`ModuleRegistry`].
///
/// One file per project: `<state_dir>/records/<project_key>.json`.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    // serializes load-modify-save of the shared file across modules
    write_lock: Mutex<()>,
}

impl StateStore {
    pub fn new(state_dir: &Path, project_root: &Path) -> Self {
        let path = state_dir
            .join("records")
            .join(format!("{}.json", Self::project_key(project_root)));
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Default state directory
    ///
    /// - Unix: `$XDG_STATE_HOME/canopy` or `~/.local/state/canopy`
    /// - Windows: `%LOCALAPPDATA%\canopy`
    pub fn default_state_dir() -> anyhow::Result<PathBuf> {
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("Cannot determine state directory"))?;
        Ok(base.join("canopy"))
    }

    /// Stable key for a project directory.
    ///
    /// Moving the project produces a new key and therefore fresh records.
    pub fn project_key(project_root: &Path) -> String {
        let path = fs::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());
        blake3::hash(path.to_string_lossy().as_bytes())
            .to_hex()
            .to_string()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<RecordsFile> {
        if !self.path.exists() {
            return Ok(RecordsFile {
                version: RECORDS_VERSION,
                networks: BTreeMap::new(),
            });
        }

        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read module records: {}", self.path.display()))?;
        let file: RecordsFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse module records: {}", self.path.display()))?;
        if file.version != RECORDS_VERSION {
            anyhow::bail!(
                "Unsupported module records version {} in {}",
                file.version,
                self.path.display()
            );
        }
        Ok(file)
    }

    fn save(&self, file: &RecordsFile) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(file).context("Failed to serialize module records")?;
        crate::fs::write_atomic(&self.path, &bytes)
    }
}

impl ModuleRegistry for StateStore {
    fn get(&self, network: &str, module: &str) -> anyhow::Result<Option<ModuleRecord>> {
        let mut file = self.load()?;
        Ok(file
            .networks
            .get_mut(network)
            .and_then(|records| records.remove(module)))
    }

    fn put(&self, network: &str, record: ModuleRecord) -> anyhow::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Module records lock poisoned"))?;

        let mut file = self.load()?;
        tracing::debug!(
            network,
            module = %record.name,
            hash = %record.installed_hash,
            "Recording module state"
        );
        file.networks
            .entry(network.to_string())
            .or_default()
            .insert(record.name.clone(), record);
        self.save(&file)
    }

    fn list(&self, network: &str) -> anyhow::Result<Vec<ModuleRecord>> {
        Ok(self
            .load()?
            .networks
            .remove(network)
            .map(|records| records.into_values().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::ContentHash;
    use crate::platform::{ModuleId, ModuleState};
    use crate::types::InstallMode;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(name: &str, bytes: &[u8]) -> ModuleRecord {
        ModuleRecord {
            name: name.to_string(),
            module_id: ModuleId::new("aaaaa-bbbbb"),
            installed_hash: ContentHash::of(bytes),
            state: ModuleState::Installed,
            mode: InstallMode::Install,
            installed_at: Utc::now(),
        }
    }

    #[test]
    fn project_key_is_stable() {
        let temp = TempDir::new().unwrap();
        let a = StateStore::project_key(temp.path());
        let b = StateStore::project_key(temp.path());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn missing_file_means_no_records() {
        let state = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let store = StateStore::new(state.path(), project.path());

        assert!(store.get("local", "hello").unwrap().is_none());
        assert!(store.list("local").unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn records_survive_reopen() {
        let state = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let store = StateStore::new(state.path(), project.path());
        store.put("local", record("hello", b"v1")).unwrap();
        store.put("local", record("assets", b"a1")).unwrap();
        store.put("ic", record("hello", b"v0")).unwrap();

        let reopened = StateStore::new(state.path(), project.path());
        let local = reopened.list("local").unwrap();
        assert_eq!(
            local.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["assets", "hello"]
        );
        assert_eq!(
            reopened.get("ic", "hello").unwrap().unwrap().installed_hash,
            ContentHash::of(b"v0")
        );
    }

    #[test]
    fn projects_do_not_share_records() {
        let state = TempDir::new().unwrap();
        let one = TempDir::new().unwrap();
        let two = TempDir::new().unwrap();

        StateStore::new(state.path(), one.path())
            .put("local", record("hello", b"v1"))
            .unwrap();

        let other = StateStore::new(state.path(), two.path());
        assert!(other.get("local", "hello").unwrap().is_none());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let state = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let store = StateStore::new(state.path(), project.path());
        crate::fs::write_atomic(store.path(), br#"{"version": 99, "networks": {}}"#).unwrap();

        let err = store.list("local").unwrap_err();
        assert!(err.to_string().contains("Unsupported module records version"));
    }
}
