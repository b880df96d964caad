use std::future::Future;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use lwk_wollet::elements::encode;
use lwk_wollet::elements::hashes::Hash as _;
use lwk_wollet::elements::pset::PartiallySignedTransaction;
use lwk_wollet::elements::secp256k1_zkp::{Message, Secp256k1, XOnlyPublicKey};
use lwk_wollet::elements::sighash::{Prevouts, SighashCache};
use lwk_wollet::elements::{
    BlockHash, SchnorrSig, SchnorrSighashType, Script, Transaction, TxOut,
};

use crate::blind::verify_amounts;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::wallet::WalletContext;

/// External signer holding the wallet's keys.
///
/// Receives a base64 PSET and returns it, base64 again, with signatures for
/// the inputs it recognizes.
pub trait PsetSigner {
    fn sign_pset(&self, pset_base64: &str) -> impl Future<Output = Result<String>> + Send;
}

pub fn pset_to_base64(pset: &PartiallySignedTransaction) -> String {
    STANDARD.encode(encode::serialize(pset))
}

pub fn pset_from_base64(pset_base64: &str) -> Result<PartiallySignedTransaction> {
    let bytes = STANDARD
        .decode(pset_base64.trim())
        .map_err(|e| Error::Encoding(format!("base64: {e}")))?;
    encode::deserialize(&bytes).map_err(|e| Error::Encoding(format!("pset: {e}")))
}

/// Attach `internal_key` to every input spending `wallet_script`, the hint a
/// signer uses to decide what to sign. Returns how many inputs were marked.
pub fn mark_wallet_inputs(
    pset: &mut PartiallySignedTransaction,
    wallet_script: &Script,
    internal_key: XOnlyPublicKey,
) -> usize {
    let mut marked = 0;
    for input in pset.inputs_mut() {
        let ours = input
            .witness_utxo
            .as_ref()
            .is_some_and(|utxo| &utxo.script_pubkey == wallet_script);
        if ours {
            input.tap_internal_key = Some(internal_key);
            marked += 1;
        }
    }
    marked
}

/// What a taproot key-path signature commits to: the unsigned transaction,
/// every spent output and the chain's genesis hash.
pub struct KeySpendSighash {
    tx: Transaction,
    prevouts: Vec<TxOut>,
    genesis_hash: BlockHash,
}

impl KeySpendSighash {
    pub fn new(pset: &PartiallySignedTransaction, network: Network) -> Result<Self> {
        let tx = pset
            .extract_tx()
            .map_err(|e| Error::Pset(format!("extract: {e}")))?;
        let prevouts = pset
            .inputs()
            .iter()
            .enumerate()
            .map(|(idx, input)| {
                input
                    .witness_utxo
                    .clone()
                    .ok_or_else(|| Error::Finalize(format!("input {idx} has no witness utxo")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tx,
            prevouts,
            genesis_hash: network.into_lwk().genesis_block_hash(),
        })
    }

    /// Message to sign for input `index`.
    pub fn message(&self, index: usize, hash_ty: SchnorrSighashType) -> Result<Message> {
        let hash = SighashCache::new(&self.tx)
            .taproot_key_spend_signature_hash(
                index,
                &Prevouts::All(self.prevouts.as_slice()),
                hash_ty,
                self.genesis_hash,
            )
            .map_err(|e| Error::Finalize(format!("sighash of input {index}: {e}")))?;
        Ok(Message::from_digest(hash.to_byte_array()))
    }
}

/// Output key of a segwit v1 script: `OP_1 PUSH32 <key>`.
fn taproot_output_key(script: &Script) -> Option<XOnlyPublicKey> {
    match script.as_bytes() {
        [0x51, 0x20, key @ ..] if key.len() == 32 => XOnlyPublicKey::from_slice(key).ok(),
        _ => None,
    }
}

/// Check every key-path signature and move it into the final witness.
///
/// Each `tap_key_sig` must verify against the input's sighash under the
/// output key of the script it spends. Inputs that already carry a final
/// witness are left alone.
pub fn finalize_pset(pset: &mut PartiallySignedTransaction, network: Network) -> Result<()> {
    let secp = Secp256k1::verification_only();
    let sighash = KeySpendSighash::new(pset, network)?;

    for (idx, input) in pset.inputs_mut().iter_mut().enumerate() {
        if input.final_script_witness.is_some() {
            continue;
        }
        let Some(SchnorrSig { sig, hash_ty }) = input.tap_key_sig else {
            return Err(Error::Finalize(format!("input {idx} is not signed")));
        };
        let output_key = input
            .witness_utxo
            .as_ref()
            .and_then(|utxo| taproot_output_key(&utxo.script_pubkey))
            .ok_or_else(|| Error::Finalize(format!("input {idx} does not spend a taproot output")))?;

        let msg = sighash.message(idx, hash_ty)?;
        secp.verify_schnorr(&sig, &msg, &output_key)
            .map_err(|e| Error::Finalize(format!("input {idx} signature: {e}")))?;

        input.final_script_witness = Some(vec![SchnorrSig { sig, hash_ty }.to_vec()]);
        input.tap_key_sig = None;
        input.tap_internal_key = None;
        input.tap_key_origins.clear();
        input.tap_merkle_root = None;
    }
    Ok(())
}

/// Mark wallet inputs, delegate to `signer`, then finalize and extract.
///
/// Fails with `WalletNotInitialized` before contacting the signer when the
/// wallet address or public key is missing. A failed attempt is final; the
/// caller rebuilds from scratch.
pub async fn sign_and_finalize<S: PsetSigner + ?Sized>(
    mut pset: PartiallySignedTransaction,
    wallet: &WalletContext,
    signer: &S,
) -> Result<Transaction> {
    let wallet_script = wallet.script_pubkey()?;
    let internal_key = wallet.x_only_public_key()?;

    let marked = mark_wallet_inputs(&mut pset, &wallet_script, internal_key);
    log::debug!("requesting signatures for {marked} of {} input(s)", pset.n_inputs());

    let signed = signer.sign_pset(&pset_to_base64(&pset)).await?;
    let mut signed = pset_from_base64(&signed)?;
    if signed.n_inputs() != pset.n_inputs() || signed.n_outputs() != pset.n_outputs() {
        return Err(Error::SignerRejected(
            "signed PSET does not match the request".into(),
        ));
    }
    let requested = pset
        .extract_tx()
        .map_err(|e| Error::Pset(format!("extract: {e}")))?
        .txid();
    let returned = signed
        .extract_tx()
        .map_err(|e| Error::Pset(format!("extract: {e}")))?
        .txid();
    if requested != returned {
        return Err(Error::SignerRejected(format!(
            "signer changed the transaction ({requested} became {returned})"
        )));
    }

    finalize_pset(&mut signed, wallet.network)?;

    let secp = Secp256k1::new();
    verify_amounts(&secp, &signed)?;
    let tx = signed
        .extract_tx()
        .map_err(|e| Error::Pset(format!("extract: {e}")))?;
    log::info!("finalized transaction {}", tx.txid());
    Ok(tx)
}
