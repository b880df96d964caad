use std::collections::HashMap;

use lwk_wollet::elements::confidential::{Asset, AssetBlindingFactor, Value, ValueBlindingFactor};
use lwk_wollet::elements::pset::PartiallySignedTransaction;
use lwk_wollet::elements::secp256k1_zkp::{
    All, Generator, PedersenCommitment, RangeProof, Secp256k1, SurjectionProof,
};
use lwk_wollet::elements::{BlindAssetProofs, BlindValueProofs, TxOut, TxOutSecrets};
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::skeleton::TxSkeleton;
use crate::utxo::UnblindedOutpoint;

/// Blind every confidential output of `skeleton`, spending `selected`.
///
/// `selected[i]` must be the outpoint behind input `i`. Each one's secrets
/// are checked against its commitments before anything is blinded. The
/// result is unsigned and its amount proofs are verified.
pub fn blind(skeleton: &TxSkeleton, selected: &[UnblindedOutpoint]) -> Result<PartiallySignedTransaction> {
    if skeleton.inputs().len() != selected.len() {
        return Err(Error::Blinding(format!(
            "{} inputs but {} selected outpoints",
            skeleton.inputs().len(),
            selected.len()
        )));
    }
    skeleton.check_balance()?;

    let secp = Secp256k1::new();
    let mut pset = skeleton.to_pset();
    let mut inp_txout_sec: HashMap<usize, TxOutSecrets> = HashMap::new();

    for (idx, (input, utxo)) in skeleton.inputs().iter().zip(selected).enumerate() {
        if input.outpoint != utxo.outpoint {
            return Err(Error::Blinding(format!(
                "input {idx} spends {} but selected outpoint is {}",
                input.outpoint, utxo.outpoint
            )));
        }
        let asset_gen = validate_owned_input(&secp, idx, utxo)?;

        if let Value::Confidential(value_commit) = utxo.txout.value {
            let proof = RangeProof::blind_value_proof(
                &mut thread_rng(),
                &secp,
                utxo.value,
                value_commit,
                asset_gen,
                utxo.value_blinding_factor,
            )
            .map_err(|e| Error::Blinding(format!("input {idx} value proof: {e}")))?;
            pset.inputs_mut()[idx].blind_value_proof = Some(Box::new(proof));
        }
        if utxo.txout.asset.is_confidential() {
            let proof = SurjectionProof::blind_asset_proof(
                &mut thread_rng(),
                &secp,
                utxo.asset,
                utxo.asset_blinding_factor,
            )
            .map_err(|e| Error::Blinding(format!("input {idx} asset proof: {e}")))?;
            pset.inputs_mut()[idx].blind_asset_proof = Some(Box::new(proof));
        }

        inp_txout_sec.insert(idx, utxo.secrets());
    }

    if !skeleton.has_confidential_outputs() {
        if selected.iter().any(UnblindedOutpoint::is_confidential) {
            return Err(Error::Blinding(
                "confidential inputs need at least one confidential output".into(),
            ));
        }
        log::debug!("no confidential outputs, leaving transaction explicit");
        verify_amounts(&secp, &pset)?;
        return Ok(pset);
    }

    pset.blind_last(&mut thread_rng(), &secp, &inp_txout_sec)
        .map_err(|e| Error::Blinding(format!("{e:?}")))?;

    verify_amounts(&secp, &pset)?;
    log::debug!(
        "blinded {} output(s) over {} owned input(s)",
        skeleton.outputs().iter().filter(|o| o.is_confidential()).count(),
        inp_txout_sec.len()
    );
    Ok(pset)
}

/// Check that the outpoint's resolved secrets open its asset and value
/// commitments, returning the asset generator.
fn validate_owned_input(
    secp: &Secp256k1<All>,
    index: usize,
    utxo: &UnblindedOutpoint,
) -> Result<Generator> {
    let fail = |reason: String| Error::BlindingValidationFailed { index, reason };

    let generator = match utxo.txout.asset {
        Asset::Explicit(asset) => {
            if asset != utxo.asset {
                return Err(fail(format!("explicit asset {asset} != resolved {}", utxo.asset)));
            }
            if utxo.asset_blinding_factor != AssetBlindingFactor::zero() {
                return Err(fail("explicit asset with non-zero blinding factor".into()));
            }
            Generator::new_unblinded(secp, asset.into_tag())
        }
        Asset::Confidential(commitment) => {
            let expected = Generator::new_blinded(
                secp,
                utxo.asset.into_tag(),
                utxo.asset_blinding_factor.into_inner(),
            );
            if commitment != expected {
                return Err(fail("asset commitment mismatch".into()));
            }
            commitment
        }
        Asset::Null => return Err(fail("missing asset".into())),
    };

    match utxo.txout.value {
        Value::Explicit(value) => {
            if value != utxo.value {
                return Err(fail(format!("explicit value {value} != resolved {}", utxo.value)));
            }
            if utxo.value_blinding_factor != ValueBlindingFactor::zero() {
                return Err(fail("explicit value with non-zero blinding factor".into()));
            }
        }
        Value::Confidential(commitment) => {
            let expected = PedersenCommitment::new(
                secp,
                utxo.value,
                utxo.value_blinding_factor.into_inner(),
                generator,
            );
            if commitment != expected {
                return Err(fail("value commitment mismatch".into()));
            }
        }
        Value::Null => return Err(fail("missing value".into())),
    }

    Ok(generator)
}

/// Extract the unsigned transaction and verify that values balance per asset
/// and every confidential output proof holds.
pub(crate) fn verify_amounts(secp: &Secp256k1<All>, pset: &PartiallySignedTransaction) -> Result<()> {
    let spent: Vec<TxOut> = pset
        .inputs()
        .iter()
        .enumerate()
        .map(|(idx, input)| {
            input
                .witness_utxo
                .clone()
                .ok_or_else(|| Error::Pset(format!("input {idx} missing witness_utxo")))
        })
        .collect::<Result<_>>()?;
    let tx = pset
        .extract_tx()
        .map_err(|e| Error::Pset(format!("extract: {e}")))?;
    tx.verify_tx_amt_proofs(secp, &spent)
        .map_err(|e| Error::Verification(e.to_string()))
}
