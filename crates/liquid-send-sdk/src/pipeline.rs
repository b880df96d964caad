use std::collections::{BTreeMap, HashSet};

use lwk_wollet::elements::{AssetId, OutPoint, Script, Transaction, Txid};

use crate::chain::ChainSource;
use crate::error::{Error, Result};
use crate::utxo::{UnblindedOutpoint, WalletOutput, unblind_output};
use crate::wallet::WalletContext;

/// Transactions touching the wallet, in the order they were discovered.
///
/// Lives only as long as the session; nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct HistoryCache {
    seen: HashSet<Txid>,
    transactions: Vec<Transaction>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull the history of `script_pubkey` and fetch transactions not yet
    /// cached. Returns how many were added.
    pub fn sync<C: ChainSource + ?Sized>(&mut self, chain: &C, script_pubkey: &Script) -> Result<usize> {
        let history = chain
            .script_history(script_pubkey)
            .map_err(|e| Error::Chain(format!("history: {e}")))?;

        let mut wanted = Vec::new();
        for entry in history {
            if !self.seen.contains(&entry.txid) && !wanted.contains(&entry.txid) {
                wanted.push(entry.txid);
            }
        }
        if wanted.is_empty() {
            return Ok(0);
        }

        let fetched = chain
            .fetch_transactions(&wanted)
            .map_err(|e| Error::Chain(format!("transactions: {e}")))?;
        let mut added = 0;
        for tx in fetched {
            if self.record(tx) {
                added += 1;
            }
        }
        log::debug!("history sync added {added} transaction(s)");
        Ok(added)
    }

    /// Append a transaction, typically one just broadcast. Returns false if it
    /// was already known.
    pub fn record(&mut self, tx: Transaction) -> bool {
        if !self.seen.insert(tx.txid()) {
            return false;
        }
        self.transactions.push(tx);
        true
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Outputs paying one of `wallet_scripts` that no known transaction spends.
pub fn compute_utxos(wallet_scripts: &[Script], transactions: &[Transaction]) -> Vec<WalletOutput> {
    let spent: HashSet<OutPoint> = transactions
        .iter()
        .flat_map(|tx| tx.input.iter().map(|input| input.previous_output))
        .collect();

    let mut utxos = Vec::new();
    for tx in transactions {
        let txid = tx.txid();
        for (vout, txout) in tx.output.iter().enumerate() {
            if !wallet_scripts.contains(&txout.script_pubkey) {
                continue;
            }
            let outpoint = OutPoint::new(txid, vout as u32);
            if spent.contains(&outpoint) {
                continue;
            }
            utxos.push(WalletOutput {
                outpoint,
                txout: txout.clone(),
            });
        }
    }
    utxos
}

/// Spendable wallet outpoints with their secrets resolved.
///
/// Empty until the wallet has both an address and a blinding key. Outputs
/// that fail to unblind are logged and left out.
pub fn derive_unblinded_outpoints(
    wallet: &WalletContext,
    transactions: &[Transaction],
) -> Vec<UnblindedOutpoint> {
    let (Some(address), Some(blinding_key)) = (wallet.address.as_ref(), wallet.blinding_private_key())
    else {
        return Vec::new();
    };

    let scripts = [address.script_pubkey()];
    compute_utxos(&scripts, transactions)
        .iter()
        .filter_map(|output| match unblind_output(output, Some(blinding_key)) {
            Ok(unblinded) => Some(unblinded),
            Err(e) => {
                log::warn!("skipping wallet output: {e}");
                None
            }
        })
        .collect()
}

/// Total spendable value per asset.
pub fn balances(utxos: &[UnblindedOutpoint]) -> Result<BTreeMap<AssetId, u64>> {
    let mut totals: BTreeMap<AssetId, u64> = BTreeMap::new();
    for utxo in utxos {
        let total = totals.entry(utxo.asset).or_default();
        *total = total.checked_add(utxo.value).ok_or(Error::AmountOverflow)?;
    }
    Ok(totals)
}
