use std::collections::BTreeMap;

use lwk_wollet::elements::bitcoin::PublicKey as BitcoinPublicKey;
use lwk_wollet::elements::pset::{Input, Output, PartiallySignedTransaction, PsbtSighashType};
use lwk_wollet::elements::secp256k1_zkp::PublicKey;
use lwk_wollet::elements::{Address, AssetId, OutPoint, Script, Sequence, TxOut};

use crate::error::{Error, Result};
use crate::utxo::UnblindedOutpoint;

/// `SIGHASH_DEFAULT`: commits to every input and output.
pub const SIGHASH_DEFAULT: u32 = 0x00;

/// One input of a transaction under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDescriptor {
    pub outpoint: OutPoint,
    pub witness_utxo: TxOut,
    pub asset: AssetId,
    pub value: u64,
    pub sighash: PsbtSighashType,
}

impl InputDescriptor {
    pub fn from_unblinded(utxo: &UnblindedOutpoint) -> Self {
        Self {
            outpoint: utxo.outpoint,
            witness_utxo: utxo.txout.clone(),
            asset: utxo.asset,
            value: utxo.value,
            sighash: PsbtSighashType::from_u32(SIGHASH_DEFAULT),
        }
    }
}

/// One output of a transaction under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDescriptor {
    Explicit {
        asset: AssetId,
        amount: u64,
        script_pubkey: Script,
    },
    Confidential {
        asset: AssetId,
        amount: u64,
        script_pubkey: Script,
        blinder_index: u32,
        blinding_key: PublicKey,
    },
}

impl OutputDescriptor {
    /// Pay `address`; confidential when the address carries a blinding key.
    pub fn to_address(asset: AssetId, amount: u64, address: &Address, blinder_index: u32) -> Self {
        let script_pubkey = address.script_pubkey();
        match address.blinding_pubkey {
            Some(blinding_key) => OutputDescriptor::Confidential {
                asset,
                amount,
                script_pubkey,
                blinder_index,
                blinding_key,
            },
            None => OutputDescriptor::Explicit {
                asset,
                amount,
                script_pubkey,
            },
        }
    }

    /// Network fee output: explicit, with an empty script.
    pub fn fee(asset: AssetId, amount: u64) -> Self {
        OutputDescriptor::Explicit {
            asset,
            amount,
            script_pubkey: Script::new(),
        }
    }

    pub fn asset(&self) -> AssetId {
        match self {
            OutputDescriptor::Explicit { asset, .. } | OutputDescriptor::Confidential { asset, .. } => {
                *asset
            }
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            OutputDescriptor::Explicit { amount, .. }
            | OutputDescriptor::Confidential { amount, .. } => *amount,
        }
    }

    pub fn script_pubkey(&self) -> &Script {
        match self {
            OutputDescriptor::Explicit { script_pubkey, .. }
            | OutputDescriptor::Confidential { script_pubkey, .. } => script_pubkey,
        }
    }

    pub fn is_confidential(&self) -> bool {
        matches!(self, OutputDescriptor::Confidential { .. })
    }

    pub fn is_fee(&self) -> bool {
        !self.is_confidential() && self.script_pubkey().is_empty()
    }

    fn to_pset_output(&self) -> Output {
        match self {
            OutputDescriptor::Explicit {
                asset,
                amount,
                script_pubkey,
            } => Output {
                script_pubkey: script_pubkey.clone(),
                amount: Some(*amount),
                asset: Some(*asset),
                ..Default::default()
            },
            OutputDescriptor::Confidential {
                asset,
                amount,
                script_pubkey,
                blinder_index,
                blinding_key,
            } => Output {
                script_pubkey: script_pubkey.clone(),
                amount: Some(*amount),
                asset: Some(*asset),
                blinding_key: Some(BitcoinPublicKey {
                    inner: *blinding_key,
                    compressed: true,
                }),
                blinder_index: Some(*blinder_index),
                ..Default::default()
            },
        }
    }
}

/// Inputs and outputs of an unsigned transaction, appended in order.
///
/// Descriptors cannot be changed or removed once pushed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxSkeleton {
    inputs: Vec<InputDescriptor>,
    outputs: Vec<OutputDescriptor>,
}

impl TxSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input(&mut self, input: InputDescriptor) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    pub fn push_output(&mut self, output: OutputDescriptor) -> usize {
        self.outputs.push(output);
        self.outputs.len() - 1
    }

    pub fn inputs(&self) -> &[InputDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputDescriptor] {
        &self.outputs
    }

    pub fn has_confidential_outputs(&self) -> bool {
        self.outputs.iter().any(OutputDescriptor::is_confidential)
    }

    /// The fee output, if one was appended.
    pub fn fee(&self) -> Option<u64> {
        self.outputs.iter().find(|o| o.is_fee()).map(|o| o.amount())
    }

    /// Per-asset `(inputs, outputs)` sums.
    pub fn totals(&self) -> Result<BTreeMap<AssetId, (u64, u64)>> {
        let mut totals: BTreeMap<AssetId, (u64, u64)> = BTreeMap::new();
        for input in &self.inputs {
            let entry = totals.entry(input.asset).or_default();
            entry.0 = entry.0.checked_add(input.value).ok_or(Error::AmountOverflow)?;
        }
        for output in &self.outputs {
            let entry = totals.entry(output.asset()).or_default();
            entry.1 = entry.1.checked_add(output.amount()).ok_or(Error::AmountOverflow)?;
        }
        Ok(totals)
    }

    /// Every asset must leave exactly as much as enters, fee included.
    pub fn check_balance(&self) -> Result<()> {
        for (asset, (inputs, outputs)) in self.totals()? {
            if inputs != outputs {
                return Err(Error::ConservationViolation {
                    asset,
                    inputs,
                    outputs,
                });
            }
        }
        Ok(())
    }

    /// Render as a PSET v2. Inputs carry their explicit asset and value;
    /// confidential outputs carry their blinding key and blinder index.
    pub fn to_pset(&self) -> PartiallySignedTransaction {
        let mut pset = PartiallySignedTransaction::new_v2();
        for input in &self.inputs {
            pset.add_input(Input {
                previous_txid: input.outpoint.txid,
                previous_output_index: input.outpoint.vout,
                witness_utxo: Some(input.witness_utxo.clone()),
                sequence: Some(Sequence::ENABLE_LOCKTIME_NO_RBF),
                sighash_type: Some(input.sighash),
                amount: Some(input.value),
                asset: Some(input.asset),
                ..Default::default()
            });
        }
        for output in &self.outputs {
            pset.add_output(output.to_pset_output());
        }
        pset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{destination, explicit_utxo, test_asset};

    #[test]
    fn destination_output_follows_address_confidentiality() {
        let asset = test_asset(0x01);

        let conf = OutputDescriptor::to_address(asset, 10, &destination(true), 0);
        match &conf {
            OutputDescriptor::Confidential {
                blinder_index,
                blinding_key,
                ..
            } => {
                assert_eq!(*blinder_index, 0);
                assert_eq!(Some(*blinding_key), destination(true).blinding_pubkey);
            }
            other => panic!("expected confidential output, got {other:?}"),
        }

        let plain = OutputDescriptor::to_address(asset, 10, &destination(false), 0);
        assert!(!plain.is_confidential());
        assert_eq!(plain.script_pubkey(), &destination(false).script_pubkey());
    }

    #[test]
    fn fee_output_has_no_script() {
        let fee = OutputDescriptor::fee(test_asset(0x01), 260);
        assert!(fee.script_pubkey().is_empty());
        assert!(fee.is_fee());
        assert!(!fee.is_confidential());
    }

    #[test]
    fn check_balance_detects_mismatch() {
        let a = test_asset(0x01);
        let mut skeleton = TxSkeleton::new();
        skeleton.push_input(InputDescriptor::from_unblinded(&explicit_utxo(a, 1000, 0)));
        skeleton.push_output(OutputDescriptor::to_address(a, 700, &destination(false), 0));
        skeleton.push_output(OutputDescriptor::fee(a, 260));

        match skeleton.check_balance() {
            Err(Error::ConservationViolation {
                asset,
                inputs,
                outputs,
            }) => {
                assert_eq!(asset, a);
                assert_eq!(inputs, 1000);
                assert_eq!(outputs, 960);
            }
            other => panic!("expected conservation violation, got {other:?}"),
        }

        skeleton.push_output(OutputDescriptor::to_address(a, 40, &destination(false), 0));
        skeleton.check_balance().unwrap();
        assert_eq!(skeleton.fee(), Some(260));
    }

    #[test]
    fn to_pset_carries_descriptor_fields() {
        let a = test_asset(0x01);
        let utxo = explicit_utxo(a, 1000, 4);
        let mut skeleton = TxSkeleton::new();
        skeleton.push_input(InputDescriptor::from_unblinded(&utxo));
        skeleton.push_output(OutputDescriptor::to_address(a, 740, &destination(true), 0));
        skeleton.push_output(OutputDescriptor::fee(a, 260));

        let pset = skeleton.to_pset();
        assert_eq!(pset.n_inputs(), 1);
        assert_eq!(pset.n_outputs(), 2);

        let input = &pset.inputs()[0];
        assert_eq!(input.previous_txid, utxo.outpoint.txid);
        assert_eq!(input.previous_output_index, 4);
        assert_eq!(input.amount, Some(1000));
        assert_eq!(input.asset, Some(a));
        assert_eq!(input.witness_utxo.as_ref(), Some(&utxo.txout));
        assert_eq!(input.sighash_type.map(|s| s.to_u32()), Some(SIGHASH_DEFAULT));

        let payment = &pset.outputs()[0];
        assert_eq!(payment.amount, Some(740));
        assert_eq!(payment.blinder_index, Some(0));
        assert!(payment.blinding_key.is_some());

        let fee = &pset.outputs()[1];
        assert_eq!(fee.amount, Some(260));
        assert!(fee.script_pubkey.is_empty());
        assert!(fee.blinding_key.is_none());
        assert!(fee.blinder_index.is_none());
    }
}
