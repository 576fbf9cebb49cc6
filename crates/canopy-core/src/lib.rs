//! Canopy Core Library
//!
//! Build and deploy orchestration for wasm modules: decides per module whether
//! to rebuild, whether to audit dependencies, and which lifecycle action
//! (install, reinstall, upgrade or nothing) to run against a network.

pub mod audit;
pub mod build;
pub mod commands;
pub mod config;
pub mod error;
pub mod fs;
pub mod install;
pub mod network;
pub mod orchestration;
pub mod platform;
pub mod process;
pub mod report;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{CanopyConfig, ConfigStore, ModuleConfigEntry, NetworkConfigEntry};
    pub use crate::types::{InstallMode, ModuleSelector, ModuleSpec, SourceKind};

    // Errors
    pub use crate::error::CanopyError;

    // Build
    pub use crate::audit::{AuditCapability, AuditFinding, AuditGate, AuditOutcome, AuditTool};
    pub use crate::build::{
        BuildArtifact, BuildError, BuildPipeline, BuildResult, Compiler, ContentHash,
    };

    // Install
    pub use crate::install::{InstallExecutor, InstallLocks, InstallPlan, PlanAction, PlanError};
    pub use crate::network::{NetworkHandle, NetworkResolver};
    pub use crate::orchestration::{
        BatchReport, BatchRequest, ModuleReport, ModuleStatus, Orchestrator,
    };
    pub use crate::platform::{ModuleId, ModuleRecord, ModuleRegistry, Transport, TransportError};
    pub use crate::report::{Notice, NoticeLevel};
}
