use std::{fs, path::Path};

use anyhow::Context;
use relay_cluster::{ChannelConfig, MaintenanceConfig};
use relay_core::{catalog::StaticCatalog, config::DispatchConfig};
use relay_model::ApiSpec;
use relay_observe::LoggerConfig;
use serde::{Deserialize, Serialize};

/// Whole agent configuration, loaded from one JSON file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub logger: LoggerConfig,
    /// Address the HTTP front end listens on.
    pub listen: String,
    pub dispatch: DispatchConfig,
    pub channel: ChannelConfig,
    pub maintenance: MaintenanceConfig,
    /// Known APIs; unknown names are served with default settings.
    pub apis: Vec<ApiSpec>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            logger: LoggerConfig::default(),
            listen: "127.0.0.1:8080".to_string(),
            dispatch: DispatchConfig::default(),
            channel: ChannelConfig::default(),
            maintenance: MaintenanceConfig::default(),
            apis: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Read `path`, or use the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn catalog(&self) -> StaticCatalog {
        self.apis.iter().cloned().collect()
    }
}
