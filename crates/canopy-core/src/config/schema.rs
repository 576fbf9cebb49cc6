//! Configuration schema for canopy.toml
//!
//! One file per project, at the project root:
//! - `[build]`: output directory and external tool timeouts
//! - `[networks.<name>]`: deploy targets
//! - `[modules.<name>]`: deployable modules

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ModuleSpec, SourceKind};

/// Root configuration structure for canopy.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CanopyConfig {
    /// Build settings shared by all modules
    #[serde(default)]
    pub build: BuildSettings,

    /// Deploy targets, keyed by network name
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfigEntry>,

    /// Deployable modules, keyed by module name
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfigEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Where built artifacts are written, relative to the project root
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,

    #[serde(default = "default_audit_timeout")]
    pub audit_timeout_secs: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            build_timeout_secs: default_build_timeout(),
            audit_timeout_secs: default_audit_timeout(),
        }
    }
}

impl BuildSettings {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout_secs)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".canopy").join("build")
}

fn default_build_timeout() -> u64 {
    600
}

fn default_audit_timeout() -> u64 {
    120
}

/// Network (deploy target) entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfigEntry {
    /// Provider URLs; the first one is used for deployment
    pub providers: Vec<String>,
}

/// Module entry (inline config for TOML)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleConfigEntry {
    /// `type = "rust"` with `package`, or `type = "prebuilt"` with `wasm`
    #[serde(flatten)]
    pub source: SourceKind,

    /// Skip the dependency vulnerability audit for this module
    #[serde(default)]
    pub skip_audit: bool,
}

impl CanopyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// All modules, ordered by name.
    pub fn module_specs(&self) -> Vec<ModuleSpec> {
        self.modules
            .iter()
            .map(|(name, entry)| entry.to_spec(name))
            .collect()
    }

    pub fn module(&self, name: &str) -> Option<ModuleSpec> {
        self.modules.get(name).map(|entry| entry.to_spec(name))
    }

    /// Validate the configuration after parsing
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.build.build_timeout_secs == 0 {
            anyhow::bail!("build.build_timeout_secs must be greater than zero");
        }
        if self.build.audit_timeout_secs == 0 {
            anyhow::bail!("build.audit_timeout_secs must be greater than zero");
        }

        for (name, entry) in &self.modules {
            validate_name("Module", name)?;
            match &entry.source {
                SourceKind::Rust { package } => {
                    if package.trim().is_empty() {
                        anyhow::bail!("Module '{}' has an empty package name", name);
                    }
                }
                SourceKind::Prebuilt { wasm } => {
                    ensure_relative(wasm).map_err(|reason| {
                        anyhow::anyhow!("Module '{}' has an invalid wasm path: {}", name, reason)
                    })?;
                }
            }
        }

        for (name, entry) in &self.networks {
            validate_name("Network", name)?;
            if entry.providers.is_empty() {
                anyhow::bail!("Network '{}' must declare at least one provider", name);
            }
            for provider in &entry.providers {
                url::Url::parse(provider).map_err(|e| {
                    anyhow::anyhow!(
                        "Network '{}' has an invalid provider URL '{}': {}",
                        name,
                        provider,
                        e
                    )
                })?;
            }
        }

        Ok(())
    }
}

impl ModuleConfigEntry {
    pub fn to_spec(&self, name: &str) -> ModuleSpec {
        ModuleSpec {
            name: name.to_string(),
            source: self.source.clone(),
            skip_audit: self.skip_audit,
        }
    }
}

fn validate_name(kind: &str, name: &str) -> anyhow::Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("{} name cannot be empty", kind);
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        anyhow::bail!("{} name '{}' must not contain path separators", kind, name);
    }
    Ok(())
}

fn ensure_relative(path: &Path) -> Result<(), &'static str> {
    if path.as_os_str().is_empty() {
        return Err("path is empty");
    }
    for component in path.components() {
        match component {
            Component::ParentDir => return Err("path traversal is not allowed"),
            Component::Prefix(_) | Component::RootDir => {
                return Err("absolute paths are not allowed");
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rust_entry(package: &str) -> ModuleConfigEntry {
        ModuleConfigEntry {
            source: SourceKind::Rust {
                package: package.to_string(),
            },
            skip_audit: false,
        }
    }

    #[test]
    fn module_specs_are_sorted_by_name() {
        let mut config = CanopyConfig::new();
        config.modules.insert("zeta".to_string(), rust_entry("zeta"));
        config.modules.insert("alpha".to_string(), rust_entry("alpha"));

        let names: Vec<_> = config
            .module_specs()
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn rejects_empty_package() {
        let mut config = CanopyConfig::new();
        config.modules.insert("hello".to_string(), rust_entry("  "));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_absolute_prebuilt_path() {
        let mut config = CanopyConfig::new();
        config.modules.insert(
            "assets".to_string(),
            ModuleConfigEntry {
                source: SourceKind::Prebuilt {
                    wasm: PathBuf::from("/tmp/assets.wasm"),
                },
                skip_audit: false,
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn rejects_network_without_providers() {
        let mut config = CanopyConfig::new();
        config.networks.insert(
            "staging".to_string(),
            NetworkConfigEntry {
                providers: Vec::new(),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unparseable_provider() {
        let mut config = CanopyConfig::new();
        config.networks.insert(
            "staging".to_string(),
            NetworkConfigEntry {
                providers: vec!["not a url".to_string()],
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid provider URL"));
    }

    #[test]
    fn default_build_settings() {
        let settings = BuildSettings::default();
        assert_eq!(settings.build_timeout(), Duration::from_secs(600));
        assert_eq!(settings.audit_timeout(), Duration::from_secs(120));
        assert_eq!(settings.output_dir, PathBuf::from(".canopy/build"));
    }
}
