//! Dependency vulnerability audit gate.
//!
//! Precedence, first match wins:
//! 1. `skip_audit` (or a module without its own dependency graph): bypassed, silent
//! 2. auditor not installed: informational notice
//! 3. auditor run: clean, or findings reported as warnings
//!
//! No outcome ever fails a build.

pub mod cargo_audit;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::process::ToolError;
use crate::report::Notice;
use crate::types::ModuleSpec;

pub use cargo_audit::CargoAudit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Vulnerability,
    Unsound,
    Unmaintained,
    Yanked,
    Notice,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Vulnerability => "vulnerability",
            Severity::Unsound => "unsound",
            Severity::Unmaintained => "unmaintained",
            Severity::Yanked => "yanked",
            Severity::Notice => "notice",
        };
        f.write_str(label)
    }
}

/// A single advisory against a locked dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub severity: Severity,
    /// Advisory identifier, e.g. `RUSTSEC-2020-0071`; empty for yanked crates
    pub advisory_id: String,
    pub package: String,
    pub version: String,
    pub title: Option<String>,
}

impl AuditFinding {
    /// `name@version` of the affected dependency.
    pub fn coordinate(&self) -> String {
        format!("{}@{}", self.package, self.version)
    }
}

impl fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.severity)?;
        if !self.advisory_id.is_empty() {
            write!(f, " {}", self.advisory_id)?;
        }
        write!(f, " {}", self.coordinate())?;
        if let Some(title) = &self.title {
            write!(f, ": {}", title)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Gate bypassed; the tool was not consulted.
    Skipped,
    ToolUnavailable { tool: String },
    Clean,
    FindingsPresent(Vec<AuditFinding>),
    /// The tool is installed but could not produce a report.
    Failed { reason: String },
}

impl AuditOutcome {
    /// Messages to surface for this outcome. Never error-level.
    pub fn notices(&self) -> Vec<Notice> {
        match self {
            AuditOutcome::Skipped | AuditOutcome::Clean => Vec::new(),
            AuditOutcome::ToolUnavailable { tool } => vec![Notice::info(format!(
                "Cannot check for vulnerabilities in rust canisters because {tool} is not installed. \
                 Please run 'cargo install {tool}' so that vulnerabilities can be detected."
            ))],
            AuditOutcome::FindingsPresent(findings) => {
                let mut notices = vec![Notice::warning(
                    "Audit found vulnerabilities in rust canisters.",
                )];
                notices.extend(
                    findings
                        .iter()
                        .map(|finding| Notice::warning(format!("  {}", finding))),
                );
                notices
            }
            AuditOutcome::Failed { reason } => vec![Notice::warning(format!(
                "Failed to audit dependencies: {}",
                reason
            ))],
        }
    }

    pub fn findings(&self) -> &[AuditFinding] {
        match self {
            AuditOutcome::FindingsPresent(findings) => findings,
            _ => &[],
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("No Cargo.lock found at {}", .0.display())]
    MissingLockfile(PathBuf),

    #[error("audit tool exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("Failed to parse audit report: {0}")]
    Parse(#[from] serde_json::Error),

    /// The project-wide run failed earlier with this reason.
    #[error("{0}")]
    Shared(String),
}

/// An installed dependency auditor.
#[async_trait]
pub trait AuditTool: Send + Sync {
    /// Tool name used in messages.
    fn name(&self) -> &str;

    /// Whether the tool is installed on this host. Asked only for modules
    /// that are actually audited.
    async fn is_installed(&self) -> bool {
        true
    }

    /// Scan the locked dependency graph of `module`.
    async fn audit(&self, module: &ModuleSpec) -> Result<Vec<AuditFinding>, AuditError>;
}

/// Whether an auditor is wired in at all.
#[derive(Clone)]
pub enum AuditCapability {
    Available(Arc<dyn AuditTool>),
    Unavailable { tool: String },
}

impl AuditCapability {
    pub fn available(tool: impl AuditTool + 'static) -> Self {
        AuditCapability::Available(Arc::new(tool))
    }

    pub fn unavailable(tool: impl Into<String>) -> Self {
        AuditCapability::Unavailable { tool: tool.into() }
    }
}

impl fmt::Debug for AuditCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCapability::Available(tool) => {
                f.debug_tuple("Available").field(&tool.name()).finish()
            }
            AuditCapability::Unavailable { tool } => f
                .debug_struct("Unavailable")
                .field("tool", tool)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditGate {
    capability: AuditCapability,
}

impl AuditGate {
    pub fn new(capability: AuditCapability) -> Self {
        Self { capability }
    }

    pub async fn audit(&self, module: &ModuleSpec) -> AuditOutcome {
        if module.skip_audit || !module.is_compiled() {
            tracing::debug!(module = %module.name, "Dependency audit bypassed");
            return AuditOutcome::Skipped;
        }

        let tool = match &self.capability {
            AuditCapability::Unavailable { tool } => {
                return AuditOutcome::ToolUnavailable { tool: tool.clone() };
            }
            AuditCapability::Available(tool) => tool,
        };
        if !tool.is_installed().await {
            return AuditOutcome::ToolUnavailable {
                tool: tool.name().to_string(),
            };
        }

        match tool.audit(module).await {
            Ok(findings) if findings.is_empty() => {
                tracing::debug!(module = %module.name, tool = tool.name(), "Audit clean");
                AuditOutcome::Clean
            }
            Ok(findings) => AuditOutcome::FindingsPresent(findings),
            Err(err) => AuditOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }
}
