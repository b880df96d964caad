use std::collections::BTreeMap;
use std::sync::Arc;

use liquid_send_sdk::elements::{AssetId, Transaction, Txid};
use liquid_send_sdk::{
    ChainSource, FeePolicy, HistoryCache, Network, Result, UnblindedOutpoint, WalletContext,
    balances, derive_unblinded_outpoints,
};
use serde::Serialize;

// ============================================================================
// Views (serialized for display)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub asset_id: String,
    pub label: String,
    pub amount_sat: u64,
    pub is_policy_asset: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub network: String,
    pub is_mainnet: bool,
    pub address: Option<String>,
    pub policy_asset_id: String,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub revision: u64,
    pub wallet: WalletInfo,
    pub transaction_count: usize,
    pub balances: Vec<BalanceView>,
}

/// Abbreviated asset id for display: `ABCD...WXYZ`.
pub fn format_asset(asset: &AssetId) -> String {
    let hex = asset.to_string();
    if hex.len() <= 8 {
        return hex.to_uppercase();
    }
    format!("{}...{}", &hex[..4], &hex[hex.len() - 4..]).to_uppercase()
}

// ============================================================================
// Wallet session
// ============================================================================

/// Everything known about one connected wallet for the lifetime of the app.
///
/// History grows by polling and by recording our own broadcasts. Every build
/// gets a fresh snapshot of the unblinded outpoints.
pub struct WalletSession<C> {
    wallet: WalletContext,
    chain: Arc<C>,
    history: HistoryCache,
    fee_policy: FeePolicy,
    revision: u64,
}

impl<C: ChainSource> WalletSession<C> {
    pub fn new(wallet: WalletContext, chain: Arc<C>, fee_policy: FeePolicy) -> Self {
        Self {
            wallet,
            chain,
            history: HistoryCache::new(),
            fee_policy,
            revision: 0,
        }
    }

    pub fn wallet(&self) -> &WalletContext {
        &self.wallet
    }

    pub fn network(&self) -> Network {
        self.wallet.network
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn fee_policy(&self) -> FeePolicy {
        self.fee_policy
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.history.transactions()
    }

    /// Poll the wallet script's history. Blocking.
    pub fn refresh(&mut self) -> Result<usize> {
        let script = self.wallet.script_pubkey()?;
        let added = self.history.sync(self.chain.as_ref(), &script)?;
        if added > 0 {
            self.bump_revision();
        }
        Ok(added)
    }

    /// Spendable outpoints as of the last refresh.
    pub fn snapshot(&self) -> Vec<UnblindedOutpoint> {
        derive_unblinded_outpoints(&self.wallet, self.history.transactions())
    }

    pub fn balances(&self) -> Result<BTreeMap<AssetId, u64>> {
        balances(&self.snapshot())
    }

    /// Balances for display, policy asset first.
    pub fn balance_views(&self) -> Result<Vec<BalanceView>> {
        let policy = self.network().policy_asset();
        let mut views: Vec<BalanceView> = self
            .balances()?
            .into_iter()
            .map(|(asset, amount_sat)| BalanceView {
                asset_id: asset.to_string(),
                label: format_asset(&asset),
                amount_sat,
                is_policy_asset: asset == policy,
            })
            .collect();
        views.sort_by_key(|v| !v.is_policy_asset);
        Ok(views)
    }

    /// Add a transaction we just broadcast so its change is spendable before
    /// the next poll.
    pub fn record_broadcast(&mut self, tx: Transaction) {
        if self.history.record(tx) {
            self.bump_revision();
        }
    }

    /// Refresh once. Returns the newest transaction when anything arrived.
    pub fn poll_incoming(&mut self) -> Result<Option<Txid>> {
        if self.refresh()? == 0 {
            return Ok(None);
        }
        Ok(self.history.transactions().last().map(|tx| tx.txid()))
    }

    pub fn wallet_info(&self) -> WalletInfo {
        let network = self.network();
        WalletInfo {
            network: network.as_str().to_string(),
            is_mainnet: network.is_mainnet(),
            address: self.wallet.address.as_ref().map(|a| a.to_string()),
            policy_asset_id: network.policy_asset().to_string(),
            explorer_url: network.explorer_url().to_string(),
        }
    }

    pub fn state(&self) -> Result<SessionState> {
        Ok(SessionState {
            revision: self.revision,
            wallet: self.wallet_info(),
            transaction_count: self.history.len(),
            balances: self.balance_views()?,
        })
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_send_sdk::elements::OutPoint;
    use liquid_send_sdk::testing::{
        MemoryChain, WalletKeys, explicit_txout, test_asset, test_txid, transaction, wallet_script,
    };

    fn session(chain: Arc<MemoryChain>) -> WalletSession<MemoryChain> {
        let wallet = WalletKeys::default().wallet(Network::LiquidTestnet);
        WalletSession::new(wallet, chain, FeePolicy::default())
    }

    fn fund(chain: &MemoryChain, asset: AssetId, value: u64, seed: u8) -> Txid {
        let script = wallet_script();
        let tx = transaction(
            &[OutPoint::new(test_txid(seed), 0)],
            vec![explicit_txout(asset, value, &script)],
        );
        chain.add_transaction(tx, &[script])
    }

    #[test]
    fn format_asset_abbreviates_uppercase() {
        let asset = test_asset(0xab);
        assert_eq!(format_asset(&asset), "ABAB...ABAB");

        let policy = Network::Liquid.policy_asset();
        let hex = policy.to_string();
        let formatted = format_asset(&policy);
        assert_eq!(formatted.len(), 11);
        assert!(formatted.starts_with(&hex[..4].to_uppercase()));
        assert!(formatted.ends_with(&hex[hex.len() - 4..].to_uppercase()));
    }

    #[test]
    fn refresh_bumps_revision_only_on_new_history() {
        let chain = Arc::new(MemoryChain::default());
        fund(&chain, test_asset(1), 1000, 0xf0);
        let mut session = session(chain.clone());

        assert_eq!(session.refresh().unwrap(), 1);
        assert_eq!(session.revision(), 1);
        assert_eq!(session.refresh().unwrap(), 0);
        assert_eq!(session.revision(), 1);
        assert_eq!(session.balances().unwrap()[&test_asset(1)], 1000);
    }

    #[test]
    fn refresh_requires_an_address() {
        let chain = Arc::new(MemoryChain::default());
        let wallet = WalletContext::uninitialized(Network::LiquidTestnet);
        let mut session = WalletSession::new(wallet, chain, FeePolicy::default());
        assert!(matches!(
            session.refresh(),
            Err(liquid_send_sdk::Error::WalletNotInitialized)
        ));
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn snapshots_are_independent_copies() {
        let chain = Arc::new(MemoryChain::default());
        fund(&chain, test_asset(1), 1000, 0xf0);
        let mut session = session(chain);
        session.refresh().unwrap();

        let mut first = session.snapshot();
        first.clear();
        assert_eq!(session.snapshot().len(), 1);
    }

    #[test]
    fn recorded_broadcast_spends_its_inputs() {
        let chain = Arc::new(MemoryChain::default());
        let funding = fund(&chain, test_asset(1), 1000, 0xf0);
        let mut session = session(chain);
        session.refresh().unwrap();

        let spend = transaction(
            &[OutPoint::new(funding, 0)],
            vec![explicit_txout(test_asset(1), 740, &wallet_script())],
        );
        session.record_broadcast(spend.clone());
        session.record_broadcast(spend);
        assert_eq!(session.revision(), 2);

        let utxos = session.snapshot();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].value, 740);
    }

    #[test]
    fn poll_incoming_returns_new_txid() {
        let chain = Arc::new(MemoryChain::default());
        let mut session = session(chain.clone());
        assert_eq!(session.poll_incoming().unwrap(), None);

        let txid = fund(&chain, test_asset(1), 500, 0xf1);
        assert_eq!(session.poll_incoming().unwrap(), Some(txid));
        assert_eq!(session.poll_incoming().unwrap(), None);
    }

    #[test]
    fn balance_views_put_policy_asset_first() {
        let chain = Arc::new(MemoryChain::default());
        let policy = Network::LiquidTestnet.policy_asset();
        fund(&chain, test_asset(0x01), 50, 0xf0);
        fund(&chain, policy, 2000, 0xf1);
        let mut session = session(chain);
        session.refresh().unwrap();

        let views = session.balance_views().unwrap();
        assert_eq!(views.len(), 2);
        assert!(views[0].is_policy_asset);
        assert_eq!(views[0].amount_sat, 2000);
        assert_eq!(views[1].label, format_asset(&test_asset(0x01)));

        let state = session.state().unwrap();
        assert_eq!(state.transaction_count, 2);
        assert_eq!(state.wallet.network, "liquid-testnet");
        assert_eq!(state.wallet.explorer_url, "https://liquid.network/testnet");
    }
}
