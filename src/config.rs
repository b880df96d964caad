use std::env;
use std::path::Path;
use std::time::Duration;

use liquid_send_sdk::{FeePolicy, Network};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_NETWORK: &str = "LIQUID_SEND_NETWORK";
pub const ENV_ELECTRUM_URL: &str = "LIQUID_SEND_ELECTRUM_URL";
pub const ENV_BASE_FEE_SAT: &str = "LIQUID_SEND_BASE_FEE_SAT";
pub const ENV_LOG: &str = "LIQUID_SEND_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid config file: {0}")]
    Parse(String),

    #[error("{key}: {message}")]
    Env { key: &'static str, message: String },
}

/// How long to wait for a wallet provider to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Inferred from the wallet address when unset.
    pub network: Option<Network>,
    /// Defaults to the network's public Electrum server.
    pub electrum_url: Option<String>,
    pub fee: FeePolicy,
    pub provider_retry: RetryPolicy,
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: None,
            electrum_url: None,
            fee: FeePolicy::default(),
            provider_retry: RetryPolicy::default(),
            log_level: None,
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read `path` if given, then apply `LIQUID_SEND_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                Self::from_json(&json)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `lookup`; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_NETWORK) {
            let network = value.parse::<Network>().map_err(|e| ConfigError::Env {
                key: ENV_NETWORK,
                message: e.to_string(),
            })?;
            self.network = Some(network);
        }
        if let Some(value) = get(ENV_ELECTRUM_URL) {
            self.electrum_url = Some(value);
        }
        if let Some(value) = get(ENV_BASE_FEE_SAT) {
            self.fee.base_fee_sat = value.trim().parse().map_err(|e| ConfigError::Env {
                key: ENV_BASE_FEE_SAT,
                message: format!("{e}"),
            })?;
        }
        if let Some(value) = get(ENV_LOG) {
            self.log_level = Some(value);
        }
        Ok(())
    }

    pub fn electrum_url_for(&self, network: Network) -> String {
        self.electrum_url
            .clone()
            .unwrap_or_else(|| network.default_electrum_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_fixed_fee_schedule() {
        let config = AppConfig::default();
        assert_eq!(config.fee.base_fee_sat, 260);
        assert_eq!(config.fee.cross_asset_multiplier_tenths, 17);
        assert_eq!(config.provider_retry.attempts, 5);
        assert_eq!(config.provider_retry.delay(), Duration::from_secs(1));
        assert!(config.network.is_none());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{"network":"liquid-testnet","providerRetry":{"attempts":2}}"#,
        )
        .unwrap();
        assert_eq!(config.network, Some(Network::LiquidTestnet));
        assert_eq!(config.provider_retry.attempts, 2);
        assert_eq!(config.provider_retry.delay_ms, 1000);
        assert_eq!(config.fee, FeePolicy::default());
    }

    #[test]
    fn invalid_json_is_reported() {
        assert!(matches!(
            AppConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::from_json(r#"{"electrumUrl":"tcp://file:50001"}"#).unwrap();
        config
            .apply_overrides(lookup(&[
                (ENV_NETWORK, "liquid"),
                (ENV_ELECTRUM_URL, "ssl://env:50002"),
                (ENV_BASE_FEE_SAT, "300"),
                (ENV_LOG, "debug"),
            ]))
            .unwrap();

        assert_eq!(config.network, Some(Network::Liquid));
        assert_eq!(config.electrum_url.as_deref(), Some("ssl://env:50002"));
        assert_eq!(config.fee.base_fee_sat, 300);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup(&[(ENV_NETWORK, "  "), (ENV_BASE_FEE_SAT, "")]))
            .unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn bad_env_values_name_the_variable() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_BASE_FEE_SAT, "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: ENV_BASE_FEE_SAT, .. }));

        let err = config
            .apply_overrides(lookup(&[(ENV_NETWORK, "dogecoin")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: ENV_NETWORK, .. }));
    }

    #[test]
    fn electrum_url_falls_back_to_network_default() {
        let config = AppConfig::default();
        assert_eq!(
            config.electrum_url_for(Network::LiquidTestnet),
            Network::LiquidTestnet.default_electrum_url()
        );

        let pinned = AppConfig {
            electrum_url: Some("tcp://localhost:60401".into()),
            ..AppConfig::default()
        };
        assert_eq!(pinned.electrum_url_for(Network::Liquid), "tcp://localhost:60401");
    }
}
