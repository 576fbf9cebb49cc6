//! Install decision table.
//!
//! | desired   | no record    | hash unchanged            | hash changed    |
//! |-----------|--------------|---------------------------|-----------------|
//! | install   | Install      | InstallConflict           | InstallConflict |
//! | reinstall | Reinstall    | Reinstall                 | Reinstall       |
//! | upgrade   | NotInstalled | NoOp (Upgrade if forced)  | Upgrade         |
//!
//! `auto` becomes `install` without a record and `upgrade` with one.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::build::ContentHash;
use crate::platform::{ModuleId, ModuleRecord};
use crate::types::InstallMode;

pub const UNCHANGED_REASON: &str = "module hash unchanged; use upgrade-unchanged to force";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Install,
    Reinstall,
    Upgrade,
    NoOp,
}

impl PlanAction {
    /// Platform install mode, `None` for a no-op.
    pub fn mode(&self) -> Option<InstallMode> {
        match self {
            PlanAction::Install => Some(InstallMode::Install),
            PlanAction::Reinstall => Some(InstallMode::Reinstall),
            PlanAction::Upgrade => Some(InstallMode::Upgrade),
            PlanAction::NoOp => None,
        }
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode() {
            Some(mode) => write!(f, "{}", mode),
            None => f.write_str("no-op"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub module: String,
    pub action: PlanAction,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error(
        "Module '{module}' is already installed with module id {module_id}; \
         use --mode reinstall or --mode upgrade"
    )]
    InstallConflict { module: String, module_id: ModuleId },

    #[error("Module '{module}' is not installed; nothing to upgrade. Use --mode install first")]
    NotInstalled { module: String },
}

/// Decide what to do with `module` given what is already recorded.
pub fn plan(
    module: &str,
    desired: InstallMode,
    force_upgrade_unchanged: bool,
    current: Option<&ModuleRecord>,
    new_hash: &ContentHash,
) -> Result<InstallPlan, PlanError> {
    let decided = |action: PlanAction, reason: String| InstallPlan {
        module: module.to_string(),
        action,
        reason,
    };

    let plan = match (desired, current) {
        (InstallMode::Install | InstallMode::Auto, None) => {
            decided(PlanAction::Install, "module is not installed".to_string())
        }
        (InstallMode::Install, Some(record)) => {
            return Err(PlanError::InstallConflict {
                module: module.to_string(),
                module_id: record.module_id.clone(),
            });
        }
        (InstallMode::Reinstall, _) => {
            decided(PlanAction::Reinstall, "reinstall requested".to_string())
        }
        (InstallMode::Upgrade, None) => {
            return Err(PlanError::NotInstalled {
                module: module.to_string(),
            });
        }
        (InstallMode::Upgrade | InstallMode::Auto, Some(record))
            if &record.installed_hash != new_hash =>
        {
            decided(
                PlanAction::Upgrade,
                format!(
                    "module hash changed from {} to {}",
                    record.installed_hash, new_hash
                ),
            )
        }
        (InstallMode::Upgrade | InstallMode::Auto, Some(_)) if force_upgrade_unchanged => decided(
            PlanAction::Upgrade,
            "module hash unchanged; upgrade forced".to_string(),
        ),
        (InstallMode::Upgrade | InstallMode::Auto, Some(_)) => {
            decided(PlanAction::NoOp, UNCHANGED_REASON.to_string())
        }
    };

    tracing::debug!(
        module,
        action = %plan.action,
        reason = %plan.reason,
        "Install plan"
    );
    Ok(plan)
}
