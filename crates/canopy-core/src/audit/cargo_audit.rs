//! `cargo-audit` adapter.
//!
//! All rust modules of a project share one `Cargo.lock`, so the report is
//! produced once per command and reused for every module. A failed run is
//! reused as well.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::{AuditError, AuditFinding, AuditTool, Severity};
use crate::process::{probe, run_with_timeout};
use crate::types::ModuleSpec;

pub const CARGO_AUDIT: &str = "cargo-audit";

#[derive(Debug)]
pub struct CargoAudit {
    cargo: PathBuf,
    project_root: PathBuf,
    timeout: Duration,
    installed: OnceCell<bool>,
    report: OnceCell<Result<Vec<AuditFinding>, String>>,
}

impl CargoAudit {
    pub fn new(project_root: PathBuf, timeout: Duration) -> Self {
        Self {
            cargo: PathBuf::from("cargo"),
            project_root,
            timeout,
            installed: OnceCell::new(),
            report: OnceCell::new(),
        }
    }

    #[cfg(test)]
    fn with_cargo(mut self, cargo: impl Into<PathBuf>) -> Self {
        self.cargo = cargo.into();
        self
    }

    fn lockfile(&self) -> PathBuf {
        self.project_root.join("Cargo.lock")
    }

    async fn run(&self) -> Result<Vec<AuditFinding>, AuditError> {
        let lockfile = self.lockfile();
        if !lockfile.exists() {
            return Err(AuditError::MissingLockfile(lockfile));
        }

        let mut command = Command::new(&self.cargo);
        command
            .current_dir(&self.project_root)
            .arg("audit")
            .arg("--json")
            .arg("--file")
            .arg(&lockfile);

        tracing::info!("Checking for vulnerabilities in {}", lockfile.display());
        let output = run_with_timeout(command, self.timeout).await?;

        // cargo-audit exits non-zero when it finds vulnerabilities; the JSON
        // report on stdout is authoritative whenever it parses.
        match parse_report(&output.stdout) {
            Ok(findings) => Ok(findings),
            Err(err) if output.status.success() => Err(err),
            Err(_) => Err(AuditError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

#[async_trait]
impl AuditTool for CargoAudit {
    fn name(&self) -> &str {
        CARGO_AUDIT
    }

    async fn is_installed(&self) -> bool {
        *self
            .installed
            .get_or_init(|| async {
                let found = probe(&self.cargo, &["audit", "--version"]).await;
                if !found {
                    tracing::debug!("cargo-audit not found on PATH");
                }
                found
            })
            .await
    }

    async fn audit(&self, _module: &ModuleSpec) -> Result<Vec<AuditFinding>, AuditError> {
        self.report
            .get_or_init(|| async { self.run().await.map_err(|err| err.to_string()) })
            .await
            .clone()
            .map_err(AuditError::Shared)
    }
}

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    vulnerabilities: Vulnerabilities,
    #[serde(default)]
    warnings: std::collections::BTreeMap<String, Vec<Entry>>,
}

#[derive(Debug, Default, Deserialize)]
struct Vulnerabilities {
    #[serde(default)]
    list: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    advisory: Option<Advisory>,
    package: Package,
}

#[derive(Debug, Deserialize)]
struct Advisory {
    id: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    version: String,
}

/// Parse the `cargo audit --json` report into findings.
pub fn parse_report(json: &[u8]) -> Result<Vec<AuditFinding>, AuditError> {
    let report: Report = serde_json::from_slice(json)?;

    let mut findings: Vec<AuditFinding> = report
        .vulnerabilities
        .list
        .into_iter()
        .map(|entry| to_finding(entry, Severity::Vulnerability))
        .collect();

    for (kind, entries) in report.warnings {
        let severity = match kind.as_str() {
            "unsound" => Severity::Unsound,
            "unmaintained" => Severity::Unmaintained,
            "yanked" => Severity::Yanked,
            _ => Severity::Notice,
        };
        findings.extend(entries.into_iter().map(|entry| to_finding(entry, severity)));
    }

    Ok(findings)
}

fn to_finding(entry: Entry, severity: Severity) -> AuditFinding {
    let (advisory_id, title) = match entry.advisory {
        Some(advisory) => (advisory.id, advisory.title),
        None => (String::new(), None),
    };
    AuditFinding {
        severity,
        advisory_id,
        package: entry.package.name,
        version: entry.package.version,
        title,
    }
}
