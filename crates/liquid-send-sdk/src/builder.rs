use lwk_wollet::elements::{Address, AssetId};

use crate::coin_select::{SelectionResult, select};
use crate::error::{Error, Result};
use crate::fee::FeePolicy;
use crate::skeleton::{InputDescriptor, OutputDescriptor, TxSkeleton};
use crate::utxo::UnblindedOutpoint;
use crate::wallet::WalletContext;

/// Every confidential output is blinded against input 0.
pub const DEFAULT_BLINDER_INDEX: u32 = 0;

/// A single payment to build.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub amount: u64,
    pub asset: AssetId,
    pub destination: Address,
    pub fee_asset: AssetId,
}

/// Unsigned, unblinded transaction plus the outpoints it spends.
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub skeleton: TxSkeleton,
    /// Target-asset selections first, then fee-asset selections. Position
    /// equals input index.
    pub selected: Vec<UnblindedOutpoint>,
    pub fee: u64,
    pub change: u64,
    pub change_for_fee: u64,
}

/// Two-pass coin selection and skeleton assembly for one payment.
#[derive(Debug, Clone)]
pub struct TransactionBuilder<'a> {
    wallet: &'a WalletContext,
    fee_policy: FeePolicy,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(wallet: &'a WalletContext, fee_policy: FeePolicy) -> Self {
        Self { wallet, fee_policy }
    }

    pub fn build(&self, request: &SendRequest, available: &[UnblindedOutpoint]) -> Result<BuiltTransaction> {
        if request.amount == 0 {
            return Err(Error::ZeroAmount);
        }
        let expected_params = self.wallet.network.address_params();
        if request.destination.params.bech_hrp != expected_params.bech_hrp {
            return Err(Error::Address(format!(
                "{} is not a {} address",
                request.destination, self.wallet.network
            )));
        }

        let same_asset = request.asset == request.fee_asset;
        let fee = self.fee_policy.fee_for(request.asset, request.fee_asset);
        let to_select = if same_asset {
            request.amount.checked_add(fee).ok_or(Error::AmountOverflow)?
        } else {
            request.amount
        };

        let target = select(available, request.asset, to_select)?;
        let fee_leg = if same_asset {
            None
        } else {
            Some(select(available, request.fee_asset, fee)?)
        };

        let change = target.total - to_select;
        let change_for_fee = fee_leg.as_ref().map_or(0, |leg| leg.total - fee);

        let mut skeleton = TxSkeleton::new();
        let mut selected = Vec::with_capacity(
            target.selected.len() + fee_leg.as_ref().map_or(0, |leg| leg.selected.len()),
        );
        for utxo in target
            .selected
            .into_iter()
            .chain(fee_leg.into_iter().flat_map(|leg: SelectionResult| leg.selected))
        {
            skeleton.push_input(InputDescriptor::from_unblinded(&utxo));
            selected.push(utxo);
        }

        skeleton.push_output(OutputDescriptor::to_address(
            request.asset,
            request.amount,
            &request.destination,
            DEFAULT_BLINDER_INDEX,
        ));
        if change > 0 {
            skeleton.push_output(OutputDescriptor::to_address(
                request.asset,
                change,
                self.wallet.address()?,
                DEFAULT_BLINDER_INDEX,
            ));
        }
        if change_for_fee > 0 {
            skeleton.push_output(OutputDescriptor::to_address(
                request.fee_asset,
                change_for_fee,
                self.wallet.address()?,
                DEFAULT_BLINDER_INDEX,
            ));
        }
        skeleton.push_output(OutputDescriptor::fee(request.fee_asset, fee));

        skeleton.check_balance()?;

        log::info!(
            "built send of {} {}: {} input(s), {} output(s), fee {fee}",
            request.amount,
            request.asset,
            skeleton.inputs().len(),
            skeleton.outputs().len()
        );

        Ok(BuiltTransaction {
            skeleton,
            selected,
            fee,
            change,
            change_for_fee,
        })
    }
}
