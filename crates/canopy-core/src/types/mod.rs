//! Shared core types used across configuration, build and install layers.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the bytes of a module are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceKind {
    /// Compiled from a cargo package to `wasm32-unknown-unknown`.
    Rust { package: String },
    /// Precompiled wasm shipped with the project (path relative to the project root).
    Prebuilt { wasm: PathBuf },
}

/// A deployable module as declared in the project configuration.
///
/// Read-only to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub name: String,
    pub source: SourceKind,
    /// Bypass the dependency audit entirely for this module.
    pub skip_audit: bool,
}

impl ModuleSpec {
    pub fn rust(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: SourceKind::Rust {
                package: package.into(),
            },
            skip_audit: false,
        }
    }

    pub fn prebuilt(name: impl Into<String>, wasm: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: SourceKind::Prebuilt { wasm: wasm.into() },
            skip_audit: false,
        }
    }

    pub fn with_skip_audit(mut self, skip_audit: bool) -> Self {
        self.skip_audit = skip_audit;
        self
    }

    /// Whether the module has a dependency graph of its own.
    pub fn is_compiled(&self) -> bool {
        matches!(self.source, SourceKind::Rust { .. })
    }
}

/// Requested lifecycle action for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// First deployment; the module must not exist yet.
    Install,
    /// Full replace, discarding module state.
    Reinstall,
    /// State-preserving code update.
    Upgrade,
    /// `Install` when nothing is recorded, `Upgrade` otherwise.
    Auto,
}

impl InstallMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallMode::Install => "install",
            InstallMode::Reinstall => "reinstall",
            InstallMode::Upgrade => "upgrade",
            InstallMode::Auto => "auto",
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which modules a command operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSelector {
    All,
    Named(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_mode_serializes_lowercase() {
        assert_eq!(InstallMode::Reinstall.to_string(), "reinstall");
        assert_eq!(
            serde_json::to_string(&InstallMode::Upgrade).unwrap(),
            "\"upgrade\""
        );
    }

    #[test]
    fn only_rust_modules_are_compiled() {
        assert!(ModuleSpec::rust("hello", "hello").is_compiled());
        assert!(!ModuleSpec::prebuilt("assets", "dist/assets.wasm").is_compiled());
    }
}
