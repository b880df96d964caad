use lwk_wollet::elements::{Script, Transaction, Txid};

/// A single entry returned by `script_history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub txid: Txid,
    /// Block height. 0 or negative means unconfirmed (mempool).
    pub height: i32,
}

/// Remote ledger access used by the UTXO pipeline and for broadcasting.
///
/// Calls are blocking; async callers run them on a blocking worker.
pub trait ChainSource {
    type Error: std::fmt::Display;

    /// Confirmed and unconfirmed history of a script, oldest first.
    fn script_history(&self, script_pubkey: &Script) -> Result<Vec<HistoryEntry>, Self::Error>;

    /// Fetch full transactions, in the order of `txids`.
    fn fetch_transactions(&self, txids: &[Txid]) -> Result<Vec<Transaction>, Self::Error>;

    /// Broadcast a finalized transaction and return its txid.
    fn broadcast(&self, tx: &Transaction) -> Result<Txid, Self::Error>;

    /// Minimum relay fee in the fee asset per kvB.
    fn relay_fee(&self) -> Result<f64, Self::Error>;
}
