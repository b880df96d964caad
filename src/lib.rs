pub mod chain_adapter;
pub mod commands;
pub mod config;
pub mod provider;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use chain_adapter::ElectrumChainAdapter;
use commands::CommandError;
use config::{AppConfig, ConfigError};
use provider::{ProviderError, WatchOnlyProvider};
use state::{BalanceView, WalletInfo};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("output encoding failed: {0}")]
    Output(String),
}

// ============================================================================
// Setup
// ============================================================================

/// Install the rustls CryptoProvider before any TLS connections.
/// electrum-client pulls in rustls 0.23 which requires an explicit provider.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// `Info` by default with noisy dependencies held at `Warn`. `level` (from
/// config) and then `RUST_LOG` override.
pub fn init_logging(level: Option<&str>) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .filter_module("rustls", log::LevelFilter::Warn)
        .filter_module("electrum_client", log::LevelFilter::Warn)
        .filter_module("lwk_wollet", log::LevelFilter::Warn);
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.parse_default_env();
    let _ = builder.try_init();
}

// ============================================================================
// Watch-only report
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletReport {
    pub wallet: WalletInfo,
    pub electrum_url: String,
    pub balances: Vec<BalanceView>,
}

/// Load config, connect to the identity in the environment, sync over
/// Electrum and return what the wallet holds.
pub async fn run(config_path: Option<&Path>) -> Result<WalletReport, AppError> {
    install_crypto_provider();
    let config = AppConfig::load(config_path)?;
    init_logging(config.log_level.as_deref());

    let provider =
        provider::enable_with_retry(WatchOnlyProvider::from_env, config.provider_retry).await?;
    let wallet = provider::wallet_context(&provider)
        .await
        .map_err(CommandError::from)?;
    let electrum_url = config.electrum_url_for(wallet.network);
    log::info!("using {} via {electrum_url}", wallet.network);

    let chain = Arc::new(ElectrumChainAdapter::new(&electrum_url));
    let session = commands::open_session(wallet, &config, chain)?;
    let balances = commands::balances(session.clone()).await?;
    let wallet = commands::wallet_info(&session)?;

    Ok(WalletReport {
        wallet,
        electrum_url,
        balances,
    })
}

pub fn report_json(report: &WalletReport) -> Result<String, AppError> {
    serde_json::to_string_pretty(report).map_err(|e| AppError::Output(e.to_string()))
}
