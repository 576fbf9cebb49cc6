//! Command-level errors that abort an invocation before any module work starts.

use thiserror::Error;

/// Pre-flight failures.
///
/// Everything that can go wrong for a single module is reported through the
/// batch report instead, so siblings keep going.
#[derive(Debug, Error)]
pub enum CanopyError {
    /// Missing selector, unknown module, invalid option combination.
    #[error("{0}")]
    Config(String),

    #[error("ComputeNetworkNotFound(\"{0}\"): the network is not configured in canopy.toml")]
    NetworkNotFound(String),
}

impl CanopyError {
    pub fn config(message: impl Into<String>) -> Self {
        CanopyError::Config(message.into())
    }
}
