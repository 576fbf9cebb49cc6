//! High-level commands for canopy operations.
//!
//! These are the entry points the CLI calls. Each command loads the project
//! configuration, wires the default adapters and returns a report; printing
//! and exit status are left to the caller.

pub mod build;
pub mod context;
pub mod deploy;
pub mod install;
pub mod status;

pub use build::{BuildCommand, BuildOptions};
pub use context::CommandContext;
pub use deploy::{DeployCommand, DeployOptions};
pub use install::{InstallCommand, InstallOptions};
pub use status::{ModuleStatusEntry, StatusCommand, StatusOptions, StatusReport};
