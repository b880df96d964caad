use std::str::FromStr;
use std::thread;
use std::time::Duration;

use liquid_send_sdk::elements::{encode, Script, Transaction, Txid};
use liquid_send_sdk::{ChainSource, HistoryEntry};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// How often `blockchain.transaction.get` is retried for a txid the server
/// has not indexed yet.
pub const FETCH_ATTEMPTS: u32 = 5;
pub const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ChainAdapterError {
    #[error("electrum error: {0}")]
    Electrum(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("transaction {0} not found after {1} attempts")]
    MissingTransaction(Txid, u32),
}

/// Adapter that implements `liquid_send_sdk::ChainSource` using the `electrum-client` crate.
pub struct ElectrumChainAdapter {
    electrum_url: String,
    fetch_attempts: u32,
    fetch_retry_delay: Duration,
}

impl ElectrumChainAdapter {
    pub fn new(electrum_url: &str) -> Self {
        Self {
            electrum_url: electrum_url.to_string(),
            fetch_attempts: FETCH_ATTEMPTS,
            fetch_retry_delay: FETCH_RETRY_DELAY,
        }
    }

    pub fn url(&self) -> &str {
        &self.electrum_url
    }

    fn client(&self) -> Result<electrum_client::Client, ChainAdapterError> {
        electrum_client::Client::new(&self.electrum_url)
            .map_err(|e| ChainAdapterError::Electrum(e.to_string()))
    }

    fn script_hash_hex(script_pubkey: &[u8]) -> String {
        let mut hash = Sha256::digest(script_pubkey).to_vec();
        hash.reverse();
        hex::encode(&hash)
    }

    fn fetch_one(
        &self,
        client: &electrum_client::Client,
        txid: &Txid,
    ) -> Result<Transaction, ChainAdapterError> {
        use electrum_client::ElectrumApi;

        for attempt in 1..=self.fetch_attempts {
            let resp = client.raw_call(
                "blockchain.transaction.get",
                [electrum_client::Param::String(txid.to_string())],
            );
            match resp {
                Ok(val) => return parse_raw_transaction(&val),
                Err(e) if is_missing_transaction(&e.to_string()) => {
                    log::debug!("{txid} not indexed yet (attempt {attempt}/{})", self.fetch_attempts);
                    if attempt < self.fetch_attempts {
                        thread::sleep(self.fetch_retry_delay);
                    }
                }
                Err(e) => return Err(ChainAdapterError::Electrum(e.to_string())),
            }
        }
        Err(ChainAdapterError::MissingTransaction(*txid, self.fetch_attempts))
    }
}

impl ChainSource for ElectrumChainAdapter {
    type Error = ChainAdapterError;

    fn script_history(&self, script_pubkey: &Script) -> Result<Vec<HistoryEntry>, Self::Error> {
        use electrum_client::ElectrumApi;

        let client = self.client()?;
        let script_hash_hex = Self::script_hash_hex(script_pubkey.as_bytes());

        let resp = client
            .raw_call(
                "blockchain.scripthash.get_history",
                [electrum_client::Param::String(script_hash_hex)],
            )
            .map_err(|e| ChainAdapterError::Electrum(e.to_string()))?;

        parse_history(&resp)
    }

    fn fetch_transactions(&self, txids: &[Txid]) -> Result<Vec<Transaction>, Self::Error> {
        let client = self.client()?;
        txids.iter().map(|txid| self.fetch_one(&client, txid)).collect()
    }

    fn broadcast(&self, tx: &Transaction) -> Result<Txid, Self::Error> {
        use electrum_client::ElectrumApi;

        let client = self.client()?;
        let raw_hex = hex::encode(encode::serialize(tx));
        let resp = client
            .raw_call(
                "blockchain.transaction.broadcast",
                [electrum_client::Param::String(raw_hex)],
            )
            .map_err(|e| ChainAdapterError::Electrum(e.to_string()))?;

        let txid_hex = resp
            .as_str()
            .ok_or_else(|| ChainAdapterError::Parse("expected txid string".into()))?;
        parse_txid(txid_hex)
    }

    fn relay_fee(&self) -> Result<f64, Self::Error> {
        use electrum_client::ElectrumApi;

        let client = self.client()?;
        let resp = client
            .raw_call("blockchain.relayfee", [])
            .map_err(|e| ChainAdapterError::Electrum(e.to_string()))?;
        resp.as_f64()
            .ok_or_else(|| ChainAdapterError::Parse("expected numeric relay fee".into()))
    }
}

/// Parse a `get_history` response. Height 0 or -1 marks mempool entries.
fn parse_history(resp: &Value) -> Result<Vec<HistoryEntry>, ChainAdapterError> {
    let entries = resp
        .as_array()
        .ok_or_else(|| ChainAdapterError::Parse("expected array response".into()))?;

    entries
        .iter()
        .map(|entry| {
            let tx_hash = entry["tx_hash"]
                .as_str()
                .ok_or_else(|| ChainAdapterError::Parse("missing tx_hash".into()))?;
            let height = entry["height"]
                .as_i64()
                .ok_or_else(|| ChainAdapterError::Parse("missing height".into()))?;
            Ok(HistoryEntry {
                txid: parse_txid(tx_hash)?,
                height: height as i32,
            })
        })
        .collect()
}

fn parse_raw_transaction(resp: &Value) -> Result<Transaction, ChainAdapterError> {
    let hex_str = resp
        .as_str()
        .ok_or_else(|| ChainAdapterError::Parse("expected string response".into()))?;
    let bytes =
        hex::decode(hex_str).map_err(|e| ChainAdapterError::Parse(format!("hex decode: {e}")))?;
    encode::deserialize(&bytes).map_err(|e| ChainAdapterError::Parse(format!("tx deserialize: {e}")))
}

/// Electrum txids are in display (reversed) byte order, as `Txid` parses them.
fn parse_txid(hex_str: &str) -> Result<Txid, ChainAdapterError> {
    Txid::from_str(hex_str).map_err(|e| ChainAdapterError::Parse(format!("bad txid {hex_str}: {e}")))
}

/// Servers report an unknown txid in different words.
fn is_missing_transaction(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("missingtransaction")
        || message.contains("missing transaction")
        || message.contains("no such mempool or blockchain transaction")
        || message.contains("transaction not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_send_sdk::elements::hashes::Hash as _;
    use liquid_send_sdk::testing::{explicit_txout, test_asset, test_txid, transaction, wallet_script};
    use liquid_send_sdk::elements::OutPoint;
    use serde_json::json;

    #[test]
    fn parse_txid_uses_display_order() {
        let display_hex = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20";
        let txid = parse_txid(display_hex).unwrap();
        let bytes = txid.to_byte_array();
        assert_eq!(bytes[0], 0x20);
        assert_eq!(bytes[31], 0x01);
        assert_eq!(txid.to_string(), display_hex);
    }

    #[test]
    fn parse_txid_rejects_bad_input() {
        assert!(parse_txid("abcd").is_err());
        assert!(parse_txid("").is_err());
        let bad = "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz";
        assert!(parse_txid(bad).is_err());
    }

    #[test]
    fn parse_history_keeps_order_and_mempool_heights() {
        let confirmed = test_txid(0x11);
        let mempool = test_txid(0x22);
        let resp = json!([
            { "tx_hash": confirmed.to_string(), "height": 1200 },
            { "tx_hash": mempool.to_string(), "height": 0, "fee": 260 },
        ]);

        let history = parse_history(&resp).unwrap();
        assert_eq!(
            history,
            vec![
                HistoryEntry { txid: confirmed, height: 1200 },
                HistoryEntry { txid: mempool, height: 0 },
            ]
        );
    }

    #[test]
    fn parse_history_rejects_malformed_entries() {
        assert!(parse_history(&json!({ "error": "nope" })).is_err());
        assert!(parse_history(&json!([{ "height": 1 }])).is_err());
        assert!(parse_history(&json!([{ "tx_hash": test_txid(1).to_string() }])).is_err());
    }

    #[test]
    fn parse_raw_transaction_decodes_hex() {
        let tx = transaction(
            &[OutPoint::new(test_txid(0xf0), 0)],
            vec![explicit_txout(test_asset(1), 1000, &wallet_script())],
        );
        let resp = json!(hex::encode(encode::serialize(&tx)));
        assert_eq!(parse_raw_transaction(&resp).unwrap(), tx);

        assert!(parse_raw_transaction(&json!(42)).is_err());
        assert!(parse_raw_transaction(&json!("00ff")).is_err());
    }

    #[test]
    fn missing_transaction_messages_are_recognized() {
        assert!(is_missing_transaction("Missing transaction"));
        assert!(is_missing_transaction(r#"{"code":2,"message":"missingtransaction"}"#));
        assert!(is_missing_transaction(
            "daemon error: No such mempool or blockchain transaction"
        ));
        assert!(!is_missing_transaction("connection reset by peer"));
    }

    #[test]
    fn script_hash_hex_matches_electrum_convention() {
        // Electrum script hash = SHA256(scriptPubKey) with reversed byte order
        let spk = wallet_script();
        let hash = ElectrumChainAdapter::script_hash_hex(spk.as_bytes());
        assert_eq!(hash.len(), 64);

        let hash_bytes = hex::decode(&hash).unwrap();
        let mut expected = Sha256::digest(spk.as_bytes()).to_vec();
        expected.reverse();
        assert_eq!(hash_bytes, expected);
    }
}
