//! Install planning and execution.

pub mod executor;
pub mod planner;

pub use executor::{ExecError, ExecResult, InstallExecutor, InstallLocks};
pub use planner::{InstallPlan, PlanAction, PlanError, UNCHANGED_REASON, plan};
