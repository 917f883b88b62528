use serde::Deserialize;
use std::time::Duration;
use crate::xrpl::reliable::DEFAULT_BACKOFF;

/// Ledger dumped when no index is given
pub const DEFAULT_LEDGER_INDEX: u32 = 60155580;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub dump: DumpConfig,
    pub database: DatabaseConfig,
    pub classification: ClassificationRulesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub url: Option<String>,
    pub request_timeout_secs: u64,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DumpConfig {
    pub ledger_index: u32,
    pub page_limit: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassificationRulesConfig {
    pub rules_path: String,
}

impl Config {
    /// Defaults, then the optional settings file, then `SPARK__SECTION__KEY` variables
    pub fn load(settings: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .set_default("node.request_timeout_secs", 30_i64)?
            .set_default("node.retry_backoff_ms", DEFAULT_BACKOFF.as_millis() as i64)?
            .set_default("dump.ledger_index", DEFAULT_LEDGER_INDEX as i64)?
            .set_default("database.path", "snapshot.db")?
            .set_default("classification.rules_path", "config.json")?
            .add_source(config::File::with_name(settings).required(false))
            .add_source(config::Environment::with_prefix("SPARK").prefix_separator("__").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.node.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.node.retry_backoff_ms)
    }

    /// Node from the command line, falling back to the settings file
    pub fn node_url(&self, cli_node: Option<&str>) -> anyhow::Result<String> {
        cli_node
            .map(str::to_string)
            .or_else(|| self.node.url.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No XRPL node given, use --node or set node.url"))
    }
}
