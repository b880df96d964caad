use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use liquid_send_sdk::elements::{Address, AssetId, Transaction};
use liquid_send_sdk::{
    blind, sign_and_finalize, ChainSource, Error as SdkError, PsetSigner, SendRequest,
    TransactionBuilder, WalletContext,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::provider::{wallet_context, LiquidProvider};
use crate::state::{BalanceView, WalletInfo, WalletSession};

pub type SharedSession<C> = Arc<Mutex<WalletSession<C>>>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("{0} task failed: {1}")]
    Task(&'static str, String),

    #[error("session lock poisoned")]
    Lock,
}

/// A payment as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    pub destination: String,
    pub amount_sat: u64,
    /// Hex asset id; the network's policy asset when absent.
    #[serde(default)]
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub txid: String,
    pub explorer_url: String,
    pub fee_sat: u64,
    pub fee_asset_id: String,
}

fn lock<C>(session: &SharedSession<C>) -> Result<std::sync::MutexGuard<'_, WalletSession<C>>, CommandError> {
    session.lock().map_err(|_| CommandError::Lock)
}

/// Turn user input into a request for `wallet`'s network. Fees are always
/// paid in the policy asset.
pub fn parse_send_params(params: &SendParams, wallet: &WalletContext) -> Result<SendRequest, SdkError> {
    let destination = Address::from_str(params.destination.trim())
        .map_err(|e| SdkError::Address(format!("{}: {e}", params.destination)))?;
    let fee_asset = wallet.network.policy_asset();
    let asset = match params.asset_id.as_deref() {
        Some(hex) => AssetId::from_str(hex.trim())
            .map_err(|e| SdkError::Encoding(format!("asset id {hex}: {e}")))?,
        None => fee_asset,
    };
    Ok(SendRequest {
        amount: params.amount_sat,
        asset,
        destination,
        fee_asset,
    })
}

/// Ask the provider for its account and open a session on it.
pub async fn connect<P, C>(
    provider: &P,
    config: &AppConfig,
    chain: Arc<C>,
) -> Result<SharedSession<C>, CommandError>
where
    P: LiquidProvider,
    C: ChainSource,
{
    let wallet = wallet_context(provider).await?;
    open_session(wallet, config, chain)
}

/// Open a session on an identity already fetched from the provider.
/// Fails when `config` pins a different network.
pub fn open_session<C: ChainSource>(
    wallet: WalletContext,
    config: &AppConfig,
    chain: Arc<C>,
) -> Result<SharedSession<C>, CommandError> {
    if let Some(expected) = config.network {
        if expected != wallet.network {
            return Err(SdkError::Address(format!(
                "provider account is on {}, configured for {expected}",
                wallet.network
            ))
            .into());
        }
    }
    log::info!(
        "connected to {} wallet {}",
        wallet.network,
        wallet.address.as_ref().map(|a| a.to_string()).unwrap_or_default()
    );
    Ok(Arc::new(Mutex::new(WalletSession::new(wallet, chain, config.fee))))
}

/// Refresh, build, blind, sign and broadcast one payment.
///
/// The signer runs in its own task, so an abandoned call still lets the
/// signer finish; its result is then dropped and nothing is broadcast.
pub async fn send<C, S>(
    session: SharedSession<C>,
    signer: Arc<S>,
    params: SendParams,
) -> Result<SendResult, CommandError>
where
    C: ChainSource + Send + Sync + 'static,
    S: PsetSigner + Send + Sync + 'static,
{
    let build_session = session.clone();
    let (pset, wallet, fee, fee_asset) = tokio::task::spawn_blocking(move || {
        let mut session = lock(&build_session)?;
        session.refresh()?;

        let wallet = session.wallet().clone();
        let request = parse_send_params(&params, &wallet)?;
        let available = session.snapshot();
        let built = TransactionBuilder::new(&wallet, session.fee_policy()).build(&request, &available)?;
        let pset = blind(&built.skeleton, &built.selected)?;
        Ok::<_, CommandError>((pset, wallet, built.fee, request.fee_asset))
    })
    .await
    .map_err(|e| CommandError::Task("build", e.to_string()))??;

    let tx: Transaction = tokio::spawn(async move { sign_and_finalize(pset, &wallet, signer.as_ref()).await })
        .await
        .map_err(|e| CommandError::Task("sign", e.to_string()))??;

    let broadcast_session = session.clone();
    let (txid, network) = tokio::task::spawn_blocking(move || {
        let chain = lock(&broadcast_session)?.chain().clone();
        let txid = chain
            .broadcast(&tx)
            .map_err(|e| SdkError::Broadcast(e.to_string()))?;

        let mut session = lock(&broadcast_session)?;
        session.record_broadcast(tx);
        Ok::<_, CommandError>((txid, session.network()))
    })
    .await
    .map_err(|e| CommandError::Task("broadcast", e.to_string()))??;

    log::info!("broadcast {txid}");
    Ok(SendResult {
        txid: txid.to_string(),
        explorer_url: network.tx_url(&txid),
        fee_sat: fee,
        fee_asset_id: fee_asset.to_string(),
    })
}

/// Refresh history and return balances for display.
pub async fn balances<C>(session: SharedSession<C>) -> Result<Vec<BalanceView>, CommandError>
where
    C: ChainSource + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut session = lock(&session)?;
        session.refresh()?;
        Ok::<_, CommandError>(session.balance_views()?)
    })
    .await
    .map_err(|e| CommandError::Task("balances", e.to_string()))?
}

pub fn wallet_info<C: ChainSource>(session: &SharedSession<C>) -> Result<WalletInfo, CommandError> {
    Ok(lock(session)?.wallet_info())
}

/// Poll until something new arrives for the wallet. Returns its txid.
///
/// The session is locked only for each refresh, so other commands run
/// between polls.
pub async fn wait_for_incoming<C>(
    session: SharedSession<C>,
    poll: Duration,
    attempts: u32,
) -> Result<Option<String>, CommandError>
where
    C: ChainSource + Send + Sync + 'static,
{
    for attempt in 1..=attempts {
        let polled = session.clone();
        let txid = tokio::task::spawn_blocking(move || {
            let mut session = lock(&polled)?;
            Ok::<_, CommandError>(session.poll_incoming()?)
        })
        .await
        .map_err(|e| CommandError::Task("wait", e.to_string()))??;

        if let Some(txid) = txid {
            return Ok(Some(txid.to_string()));
        }
        if attempt < attempts {
            tokio::time::sleep(poll).await;
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_send_sdk::testing::{destination, MemoryChain, WalletKeys};
    use liquid_send_sdk::Network;

    #[test]
    fn parse_defaults_to_policy_asset() {
        let wallet = WalletKeys::default().wallet(Network::LiquidTestnet);
        let params = SendParams {
            destination: destination(true).to_string(),
            amount_sat: 1000,
            asset_id: None,
        };
        let request = parse_send_params(&params, &wallet).unwrap();
        assert_eq!(request.asset, Network::LiquidTestnet.policy_asset());
        assert_eq!(request.fee_asset, request.asset);
        assert_eq!(request.destination, destination(true));
    }

    #[test]
    fn parse_reads_asset_hex() {
        let wallet = WalletKeys::default().wallet(Network::LiquidTestnet);
        let asset = liquid_send_sdk::testing::test_asset(0x42);
        let params = SendParams {
            destination: destination(false).to_string(),
            amount_sat: 5,
            asset_id: Some(asset.to_string()),
        };
        let request = parse_send_params(&params, &wallet).unwrap();
        assert_eq!(request.asset, asset);
        assert_eq!(request.fee_asset, Network::LiquidTestnet.policy_asset());
    }

    #[test]
    fn parse_rejects_bad_input() {
        let wallet = WalletKeys::default().wallet(Network::LiquidTestnet);
        let bad_address = SendParams {
            destination: "nope".into(),
            amount_sat: 5,
            asset_id: None,
        };
        assert!(matches!(
            parse_send_params(&bad_address, &wallet),
            Err(SdkError::Address(_))
        ));

        let bad_asset = SendParams {
            destination: destination(true).to_string(),
            amount_sat: 5,
            asset_id: Some("xyz".into()),
        };
        assert!(matches!(
            parse_send_params(&bad_asset, &wallet),
            Err(SdkError::Encoding(_))
        ));
    }

    #[test]
    fn open_session_uses_the_given_identity() {
        let wallet = WalletKeys::default().wallet(Network::LiquidTestnet);
        let chain = Arc::new(MemoryChain::default());

        let session = open_session(wallet.clone(), &AppConfig::default(), chain.clone()).unwrap();
        let info = wallet_info(&session).unwrap();
        assert_eq!(info.network, "liquid-testnet");
        assert_eq!(info.address, wallet.address.as_ref().map(|a| a.to_string()));

        let mainnet = AppConfig {
            network: Some(Network::Liquid),
            ..AppConfig::default()
        };
        let err = open_session(wallet, &mainnet, chain).err().unwrap();
        assert!(matches!(err, CommandError::Sdk(SdkError::Address(_))));
    }

    #[test]
    fn send_params_deserialize_without_asset() {
        let params: SendParams =
            serde_json::from_str(r#"{"destination":"tlq1","amountSat":42}"#).unwrap();
        assert_eq!(params.amount_sat, 42);
        assert!(params.asset_id.is_none());
    }
}
