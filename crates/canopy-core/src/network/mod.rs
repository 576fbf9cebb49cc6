//! Network resolution.
//!
//! A command names one deploy target. The name is checked against the
//! configured set once, before any build or install work, so an invalid
//! target aborts without side effects.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use url::Url;

use crate::config::CanopyConfig;
use crate::error::CanopyError;

/// Name of the always-available development network.
pub const LOCAL_NETWORK: &str = "local";

/// Replica directory of the built-in `local` network, relative to the project root.
pub const LOCAL_REPLICA_DIR: &str = ".canopy/replica";

/// A validated deploy target. Immutable for the duration of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkHandle {
    name: String,
    providers: Vec<Url>,
    ephemeral: bool,
}

impl NetworkHandle {
    pub fn new(name: impl Into<String>, providers: Vec<Url>) -> Self {
        Self {
            name: name.into(),
            providers,
            ephemeral: false,
        }
    }

    /// Network created on the fly from a provider URL given as the network name.
    pub fn ephemeral(url: Url) -> Self {
        Self {
            name: url.to_string(),
            providers: vec![url],
            ephemeral: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn providers(&self) -> &[Url] {
        &self.providers
    }

    /// The provider used for deployment.
    pub fn primary_provider(&self) -> Option<&Url> {
        self.providers.first()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }
}

impl fmt::Display for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The configured network set.
#[derive(Debug, Clone)]
pub struct NetworkResolver {
    networks: BTreeMap<String, NetworkHandle>,
}

impl NetworkResolver {
    /// Build the set from project configuration plus the built-in `local` network.
    ///
    /// A `[networks.local]` entry in the configuration replaces the built-in one.
    pub fn from_config(project_root: &Path, config: &CanopyConfig) -> anyhow::Result<Self> {
        let mut networks = BTreeMap::new();

        let replica_dir = project_root.join(LOCAL_REPLICA_DIR);
        let local_provider = Url::from_directory_path(&replica_dir).map_err(|_| {
            anyhow::anyhow!(
                "Project root must be an absolute path: {}",
                project_root.display()
            )
        })?;
        networks.insert(
            LOCAL_NETWORK.to_string(),
            NetworkHandle::new(LOCAL_NETWORK, vec![local_provider]),
        );

        for (name, entry) in &config.networks {
            let providers = entry
                .providers
                .iter()
                .map(|p| {
                    Url::parse(p).map_err(|e| {
                        anyhow::anyhow!(
                            "Invalid provider URL '{}' for network '{}': {}",
                            p,
                            name,
                            e
                        )
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            networks.insert(name.clone(), NetworkHandle::new(name.clone(), providers));
        }

        Ok(Self { networks })
    }

    pub fn from_networks(handles: impl IntoIterator<Item = NetworkHandle>) -> Self {
        Self {
            networks: handles
                .into_iter()
                .map(|handle| (handle.name.clone(), handle))
                .collect(),
        }
    }

    /// Validate `name` against the configured set.
    ///
    /// An `http:`/`https:` URL is accepted as an ephemeral network.
    pub fn resolve(&self, name: &str) -> Result<NetworkHandle, CanopyError> {
        if let Some(handle) = self.networks.get(name) {
            tracing::debug!(network = name, "Resolved configured network");
            return Ok(handle.clone());
        }

        if let Some(url) = parse_network_url(name) {
            tracing::debug!(network = name, "Using ephemeral network");
            return Ok(NetworkHandle::ephemeral(url));
        }

        Err(CanopyError::NetworkNotFound(name.to_string()))
    }
}

fn parse_network_url(name: &str) -> Option<Url> {
    if !(name.starts_with("http://") || name.starts_with("https://")) {
        return None;
    }
    let url = Url::parse(name).ok()?;
    url.host_str().is_some().then_some(url)
}
