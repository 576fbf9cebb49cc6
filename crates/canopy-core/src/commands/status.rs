//! Status command: configured modules against recorded state on a network.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::commands::context::CommandContext;
use crate::network::LOCAL_NETWORK;
use crate::platform::{ModuleRecord, ModuleRegistry};

#[derive(Debug, Clone)]
pub struct StatusOptions {
    pub network: String,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self {
            network: LOCAL_NETWORK.to_string(),
        }
    }
}

impl StatusOptions {
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatusEntry {
    pub name: String,
    /// Present in `canopy.toml`
    pub declared: bool,
    /// Last successful install on the network
    pub record: Option<ModuleRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub network: String,
    pub modules: Vec<ModuleStatusEntry>,
}

impl StatusReport {
    /// Recorded modules that are no longer declared.
    pub fn orphaned(&self) -> impl Iterator<Item = &ModuleStatusEntry> {
        self.modules.iter().filter(|m| !m.declared)
    }
}

#[derive(Debug, Clone)]
pub struct StatusCommand {
    ctx: CommandContext,
}

impl StatusCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(CommandContext::with_defaults()?))
    }

    pub fn execute(&self, options: &StatusOptions) -> anyhow::Result<StatusReport> {
        let config = self.ctx.load_config()?;
        let network = self.ctx.resolver(&config)?.resolve(&options.network)?;
        let records = self.ctx.registry().list(network.name())?;

        let mut modules: BTreeMap<String, ModuleStatusEntry> = config
            .modules
            .keys()
            .map(|name| {
                (
                    name.clone(),
                    ModuleStatusEntry {
                        name: name.clone(),
                        declared: true,
                        record: None,
                    },
                )
            })
            .collect();
        for record in records {
            let name = record.name.clone();
            let entry = modules
                .entry(name.clone())
                .or_insert_with(|| ModuleStatusEntry {
                    name,
                    declared: false,
                    record: None,
                });
            entry.record = Some(record);
        }

        Ok(StatusReport {
            network: network.name().to_string(),
            modules: modules.into_values().collect(),
        })
    }
}
