use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

pub const NODE_ENV_VAR: &str = "RPC_GATEWAY_NODE";
pub const FALLBACK_NODE_ENV_VAR: &str = "RPC_GATEWAY_FALLBACK_NODE";
pub const CHAIN_ENV_VAR: &str = "RPC_GATEWAY_CHAIN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Everything an [`RpcGateway`](crate::ethereum::gateway::RpcGateway) needs.
/// Fixed for the lifetime of the gateway built from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// Primary JSON-RPC endpoint.
    pub node: String,
    /// Preventive node queried when the primary returns nothing usable.
    #[serde(default)]
    pub fallback_node: Option<String>,
    /// Key into `chains`, e.g. `eth_mainnet`.
    pub chain: String,
    #[serde(default = "default_chains")]
    pub chains: HashMap<String, u64>,
    /// HTTP client timeout. Unset means reqwest's default (none).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allow_write_operations: bool,
}

fn default_chains() -> HashMap<String, u64> {
    HashMap::from([
        ("eth_mainnet".to_string(), 1),
        ("bsc_mainnet".to_string(), 56),
    ])
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            node: "http://localhost:8545".to_string(),
            fallback_node: None,
            chain: "eth_mainnet".to_string(),
            chains: default_chains(),
            timeout_secs: None,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_write_operations: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new(node: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            chain: chain.into(),
            ..Self::default()
        }
    }

    pub fn with_fallback_node(mut self, url: impl Into<String>) -> Self {
        self.fallback_node = Some(url.into());
        self
    }

    /// Registers an extra chain identifier.
    pub fn with_chain(mut self, name: impl Into<String>, chain_id: u64) -> Self {
        self.chains.insert(name.into(), chain_id);
        self
    }

    /// Numeric id of the configured chain, if it is known.
    pub fn chain_id(&self) -> Option<u64> {
        self.chains.get(&self.chain).copied()
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    fn apply_env_vars(&mut self) {
        if let Ok(node) = std::env::var(NODE_ENV_VAR) {
            tracing::info!("Using {} for the primary node", NODE_ENV_VAR);
            self.gateway.node = node;
        }

        if let Ok(fallback) = std::env::var(FALLBACK_NODE_ENV_VAR) {
            tracing::info!("Using {} for the preventive node", FALLBACK_NODE_ENV_VAR);
            self.gateway.fallback_node = Some(fallback).filter(|url| !url.is_empty());
        }

        if let Ok(chain) = std::env::var(CHAIN_ENV_VAR) {
            tracing::debug!("Using chain '{}' from {}", chain, CHAIN_ENV_VAR);
            self.gateway.chain = chain;
        }

        if self.gateway.node.contains("localhost") || self.gateway.node.contains("127.0.0.1") {
            tracing::warn!(
                "Primary node is {}, set {} or --node for a remote endpoint",
                self.gateway.node,
                NODE_ENV_VAR
            );
        }
    }

    /// Rejects endpoints that cannot be posted to.
    pub fn validate(&self) -> Result<()> {
        validate_url("node", &self.gateway.node)?;
        if let Some(fallback) = &self.gateway.fallback_node {
            validate_url("fallback_node", fallback)?;
        }

        if self.gateway.chain.is_empty() {
            return Err(anyhow!("Chain identifier cannot be empty"));
        }

        if self.gateway.chain_id().is_none() {
            let mut known: Vec<&String> = self.gateway.chains.keys().collect();
            known.sort();
            tracing::warn!(
                "Chain '{}' is not in the chain table ({:?}); transactions will be refused",
                self.gateway.chain,
                known
            );
        }

        Ok(())
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("rpc-gateway").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# RPC Gateway Configuration File

[gateway]
# Primary JSON-RPC node
node = "https://rpc-bsc.bnb48.club"
# Preventive node, queried once when the primary returns nothing usable
# fallback_node = "https://bsc-dataseed.binance.org"
# Chain identifier, must be a key of [gateway.chains]
chain = "bsc_mainnet"
# HTTP timeout in seconds (unset: no timeout)
# timeout_secs = 30

[gateway.chains]
eth_mainnet = 1
bsc_mainnet = 56

[security]
allow_write_operations = false

# Environment variables that can be used:
# RPC_GATEWAY_NODE - overrides gateway.node
# RPC_GATEWAY_FALLBACK_NODE - overrides gateway.fallback_node
# RPC_GATEWAY_CHAIN - overrides gateway.chain
"#;
        sample_config.to_string()
    }
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(anyhow!("'{}' cannot be empty", field));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(anyhow!(
            "Invalid '{}' URL: '{}'. Expected an http:// or https:// endpoint",
            field,
            url
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::generate_sample()).unwrap();

        assert_eq!(config.gateway.chain, "bsc_mainnet");
        assert_eq!(config.gateway.chain_id(), Some(56));
        assert_eq!(config.gateway.fallback_node, None);
        assert!(!config.security.allow_write_operations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chain_table_is_extensible() {
        let config = GatewayConfig::new("https://rpc.example", "polygon_mainnet");
        assert_eq!(config.chain_id(), None);

        let config = config.with_chain("polygon_mainnet", 137);
        assert_eq!(config.chain_id(), Some(137));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut config = Config::default();
        config.gateway.node = "".to_string();
        assert!(config.validate().is_err());

        config.gateway.node = "ws://node".to_string();
        assert!(config.validate().is_err());

        config.gateway.node = "https://node".to_string();
        config.gateway.fallback_node = Some("node2".to_string());
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.gateway = GatewayConfig::new("https://primary.example", "eth_mainnet")
            .with_fallback_node("https://fallback.example");
        config.save_to_file(&path).await.unwrap();

        let loaded = Config::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.gateway, config.gateway);
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load_or_default(Some(temp_dir.path().join("absent.toml"))).await;

        assert_eq!(config.gateway.chain_id(), Some(1));
    }
}
