//! Project configuration (`canopy.toml`).
//!
//! The configuration is loaded once per command and passed explicitly into
//! the build pipeline and the install planner; nothing reads it globally.

pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{parse_canopy_toml, parse_canopy_toml_str};
pub use schema::{BuildSettings, CanopyConfig, ModuleConfigEntry, NetworkConfigEntry};
pub use store::{CONFIG_FILE_NAME, ConfigStore};
