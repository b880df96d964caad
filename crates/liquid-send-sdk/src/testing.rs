//! Fixtures for exercising the send pipeline without a live network.
//!
//! Keys are deterministic; confidential outputs carry real commitments and
//! proofs so they unblind and blind exactly like outputs seen on chain.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use lwk_wollet::elements::confidential::{
    Asset, AssetBlindingFactor, Nonce, Value as ConfValue, ValueBlindingFactor,
};
use lwk_wollet::elements::hashes::Hash;
use lwk_wollet::elements::pset::PartiallySignedTransaction;
use lwk_wollet::elements::secp256k1_zkp::{Keypair, PublicKey, Scalar, Secp256k1, SecretKey};
use lwk_wollet::elements::taproot::TapTweakHash;
use lwk_wollet::elements::{
    Address, AssetId, LockTime, OutPoint, SchnorrSig, SchnorrSighashType, Script, Sequence,
    Transaction, TxIn, TxOut, TxOutSecrets, TxOutWitness, Txid,
};
use rand::thread_rng;

use crate::chain::{ChainSource, HistoryEntry};
use crate::error::{Error, Result};
use crate::network::Network;
use crate::sign::{KeySpendSighash, PsetSigner, pset_from_base64, pset_to_base64};
use crate::utxo::{UnblindedOutpoint, WalletOutput, unblind_output};
use crate::wallet::WalletContext;

pub fn test_asset(byte: u8) -> AssetId {
    AssetId::from_slice(&[byte; 32]).expect("asset id from fixed bytes")
}

pub fn test_txid(byte: u8) -> Txid {
    Txid::from_slice(&[byte; 32]).expect("txid from fixed bytes")
}

/// Spend key and blinding key of a test wallet.
#[derive(Debug, Clone)]
pub struct WalletKeys {
    pub secret: SecretKey,
    pub public_key: PublicKey,
    pub blinding_secret: SecretKey,
    pub blinding_public: PublicKey,
}

impl WalletKeys {
    pub fn from_seed(spend: u8, blinding: u8) -> Self {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[spend; 32]).expect("spend key");
        let blinding_secret = SecretKey::from_slice(&[blinding; 32]).expect("blinding key");
        Self {
            secret,
            public_key: PublicKey::from_secret_key(&secp, &secret),
            blinding_secret,
            blinding_public: PublicKey::from_secret_key(&secp, &blinding_secret),
        }
    }

    /// Confidential taproot address.
    pub fn address(&self, network: Network) -> Address {
        let secp = Secp256k1::new();
        Address::p2tr(
            &secp,
            self.public_key.x_only_public_key().0,
            None,
            Some(self.blinding_public),
            network.address_params(),
        )
    }

    /// Key-path signing key for the output of `address`: the spend key
    /// tweaked with the taproot commitment to no script tree.
    pub fn output_keypair(&self) -> Keypair {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &self.secret);
        let tweak = TapTweakHash::from_key_and_tweak(keypair.x_only_public_key().0, None);
        let tweak = Scalar::from_be_bytes(tweak.to_byte_array()).expect("tweak below curve order");
        keypair.add_xonly_tweak(&secp, &tweak).expect("tweaked keypair")
    }

    pub fn unconfidential_address(&self, network: Network) -> Address {
        self.address(network).to_unconfidential()
    }

    pub fn wallet(&self, network: Network) -> WalletContext {
        WalletContext {
            network,
            address: Some(self.address(network)),
            public_key: Some(self.public_key),
            blinding_private_key: Some(self.blinding_secret),
        }
    }
}

impl Default for WalletKeys {
    fn default() -> Self {
        Self::from_seed(0x01, 0x02)
    }
}

/// Keys of somebody else, used for payment destinations.
pub fn recipient_keys() -> WalletKeys {
    WalletKeys::from_seed(0x05, 0x06)
}

pub fn destination(confidential: bool) -> Address {
    let keys = recipient_keys();
    if confidential {
        keys.address(Network::LiquidTestnet)
    } else {
        keys.unconfidential_address(Network::LiquidTestnet)
    }
}

pub fn wallet_script() -> Script {
    WalletKeys::default()
        .address(Network::LiquidTestnet)
        .script_pubkey()
}

pub fn explicit_txout(asset: AssetId, value: u64, script_pubkey: &Script) -> TxOut {
    TxOut {
        asset: Asset::Explicit(asset),
        value: ConfValue::Explicit(value),
        nonce: Nonce::Null,
        script_pubkey: script_pubkey.clone(),
        witness: TxOutWitness::default(),
    }
}

/// An explicit output at `test_txid(vout + 1):vout`.
pub fn explicit_output(asset: AssetId, value: u64, script_pubkey: &Script, vout: u32) -> WalletOutput {
    WalletOutput {
        outpoint: OutPoint::new(test_txid(vout as u8 + 1), vout),
        txout: explicit_txout(asset, value, script_pubkey),
    }
}

/// A confidential output sent to `address`, with the factors it was blinded with.
pub fn confidential_txout(
    asset: AssetId,
    value: u64,
    address: &Address,
) -> (TxOut, AssetBlindingFactor, ValueBlindingFactor) {
    let secp = Secp256k1::new();
    let spent = [TxOutSecrets::new(
        asset,
        AssetBlindingFactor::zero(),
        value,
        ValueBlindingFactor::zero(),
    )];
    let (txout, abf, vbf, _) = TxOut::new_not_last_confidential(
        &mut thread_rng(),
        &secp,
        value,
        address.clone(),
        asset,
        &spent,
    )
    .expect("confidential txout");
    (txout, abf, vbf)
}

pub fn confidential_output(
    asset: AssetId,
    value: u64,
    address: &Address,
    vout: u32,
) -> (WalletOutput, AssetBlindingFactor, ValueBlindingFactor) {
    let (txout, abf, vbf) = confidential_txout(asset, value, address);
    let output = WalletOutput {
        outpoint: OutPoint::new(test_txid(vout as u8 + 1), vout),
        txout,
    };
    (output, abf, vbf)
}

/// Explicit wallet UTXO, ready for coin selection.
pub fn explicit_utxo(asset: AssetId, value: u64, vout: u32) -> UnblindedOutpoint {
    unblind_output(&explicit_output(asset, value, &wallet_script(), vout), None)
        .expect("explicit output")
}

/// Confidential wallet UTXO blinded to the default wallet address.
pub fn confidential_utxo(asset: AssetId, value: u64, vout: u32) -> UnblindedOutpoint {
    let keys = WalletKeys::default();
    let address = keys.address(Network::LiquidTestnet);
    let (output, _, _) = confidential_output(asset, value, &address, vout);
    unblind_output(&output, Some(&keys.blinding_secret)).expect("wallet key unblinds")
}

/// A transaction spending `spends` and creating `outputs`.
pub fn transaction(spends: &[OutPoint], outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: 2,
        lock_time: LockTime::ZERO,
        input: spends
            .iter()
            .map(|outpoint| TxIn {
                previous_output: *outpoint,
                is_pegin: false,
                script_sig: Script::new(),
                sequence: Sequence::ENABLE_LOCKTIME_NO_RBF,
                asset_issuance: Default::default(),
                witness: Default::default(),
            })
            .collect(),
        output: outputs,
    }
}

// ---------------------------------------------------------------------------
// In-memory chain source
// ---------------------------------------------------------------------------

/// Chain source backed by a map of transactions and per-script histories.
#[derive(Debug, Default)]
pub struct MemoryChain {
    transactions: Mutex<HashMap<Txid, Transaction>>,
    histories: Mutex<HashMap<Script, Vec<Txid>>>,
    fetched: Mutex<Vec<Txid>>,
    broadcasts: Mutex<Vec<Transaction>>,
}

impl MemoryChain {
    /// Record `tx` as confirmed history of every script it pays to or spends from.
    pub fn add_transaction(&self, tx: Transaction, scripts: &[Script]) -> Txid {
        let txid = tx.txid();
        self.transactions.lock().expect("lock").insert(txid, tx);
        let mut histories = self.histories.lock().expect("lock");
        for script in scripts {
            histories.entry(script.clone()).or_default().push(txid);
        }
        txid
    }

    /// Every txid passed to `fetch_transactions` so far.
    pub fn fetched(&self) -> Vec<Txid> {
        self.fetched.lock().expect("lock").clone()
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.broadcasts.lock().expect("lock").clone()
    }
}

impl ChainSource for MemoryChain {
    type Error = String;

    fn script_history(&self, script_pubkey: &Script) -> std::result::Result<Vec<HistoryEntry>, String> {
        let histories = self.histories.lock().map_err(|e| e.to_string())?;
        Ok(histories
            .get(script_pubkey)
            .map(|txids| {
                txids
                    .iter()
                    .map(|txid| HistoryEntry { txid: *txid, height: 100 })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_transactions(&self, txids: &[Txid]) -> std::result::Result<Vec<Transaction>, String> {
        let transactions = self.transactions.lock().map_err(|e| e.to_string())?;
        self.fetched
            .lock()
            .map_err(|e| e.to_string())?
            .extend_from_slice(txids);
        txids
            .iter()
            .map(|txid| {
                transactions
                    .get(txid)
                    .cloned()
                    .ok_or_else(|| format!("missing transaction {txid}"))
            })
            .collect()
    }

    fn broadcast(&self, tx: &Transaction) -> std::result::Result<Txid, String> {
        self.broadcasts
            .lock()
            .map_err(|e| e.to_string())?
            .push(tx.clone());
        Ok(tx.txid())
    }

    fn relay_fee(&self) -> std::result::Result<f64, String> {
        Ok(0.000_001)
    }
}

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

/// Signs every input marked with its own internal key, the way a wallet
/// extension would: a BIP-341 key-path signature with the tweaked spend key.
#[derive(Debug)]
pub struct KeySigner {
    keys: WalletKeys,
    network: Network,
    calls: AtomicUsize,
}

impl KeySigner {
    pub fn new(keys: WalletKeys, network: Network) -> Self {
        Self {
            keys,
            network,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for KeySigner {
    fn default() -> Self {
        Self::new(WalletKeys::default(), Network::LiquidTestnet)
    }
}

impl PsetSigner for KeySigner {
    async fn sign_pset(&self, pset_base64: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut pset: PartiallySignedTransaction = pset_from_base64(pset_base64)?;
        let secp = Secp256k1::new();
        let internal_key = self.keys.public_key.x_only_public_key().0;
        let keypair = self.keys.output_keypair();
        let sighash = KeySpendSighash::new(&pset, self.network)?;

        for (idx, input) in pset.inputs_mut().iter_mut().enumerate() {
            if input.tap_internal_key != Some(internal_key) {
                continue;
            }
            let msg = sighash.message(idx, SchnorrSighashType::Default)?;
            input.tap_key_sig = Some(SchnorrSig {
                sig: secp.sign_schnorr_no_aux_rand(&msg, &keypair),
                hash_ty: SchnorrSighashType::Default,
            });
        }
        Ok(pset_to_base64(&pset))
    }
}

/// Always refuses to sign.
#[derive(Debug, Default)]
pub struct RejectingSigner {
    calls: AtomicUsize,
}

impl RejectingSigner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PsetSigner for RejectingSigner {
    async fn sign_pset(&self, _pset_base64: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::SignerRejected("user declined".into()))
    }
}
