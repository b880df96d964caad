use lwk_wollet::elements::confidential::{Asset, AssetBlindingFactor, Value, ValueBlindingFactor};
use lwk_wollet::elements::secp256k1_zkp::{Secp256k1, SecretKey};
use lwk_wollet::elements::{AssetId, OutPoint, TxOut, TxOutSecrets};

use crate::error::{Error, Result};

/// A wallet-owned transaction output as observed in chain history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletOutput {
    pub outpoint: OutPoint,
    pub txout: TxOut,
}

/// A wallet output together with the secrets that open its commitments.
///
/// For an explicit output both blinding factors are zero and the asset and
/// value are read straight from the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnblindedOutpoint {
    pub outpoint: OutPoint,
    pub txout: TxOut,
    pub asset: AssetId,
    pub value: u64,
    pub asset_blinding_factor: AssetBlindingFactor,
    pub value_blinding_factor: ValueBlindingFactor,
}

impl UnblindedOutpoint {
    pub fn secrets(&self) -> TxOutSecrets {
        TxOutSecrets::new(
            self.asset,
            self.asset_blinding_factor,
            self.value,
            self.value_blinding_factor,
        )
    }

    /// True when either the asset or the value of the output is committed.
    pub fn is_confidential(&self) -> bool {
        self.txout.asset.is_confidential() || self.txout.value.is_confidential()
    }
}

/// Resolve the asset, value and blinding factors of a wallet output.
pub fn unblind_output(
    output: &WalletOutput,
    blinding_key: Option<&SecretKey>,
) -> Result<UnblindedOutpoint> {
    if let (Asset::Explicit(asset), Value::Explicit(value)) =
        (output.txout.asset, output.txout.value)
    {
        return Ok(UnblindedOutpoint {
            outpoint: output.outpoint,
            txout: output.txout.clone(),
            asset,
            value,
            asset_blinding_factor: AssetBlindingFactor::zero(),
            value_blinding_factor: ValueBlindingFactor::zero(),
        });
    }

    let key = blinding_key.ok_or_else(|| {
        Error::Unblind(format!("{} is confidential and no blinding key is set", output.outpoint))
    })?;

    let secp = Secp256k1::new();
    let secrets = output
        .txout
        .unblind(&secp, *key)
        .map_err(|e| Error::Unblind(format!("{}: {e}", output.outpoint)))?;

    Ok(UnblindedOutpoint {
        outpoint: output.outpoint,
        txout: output.txout.clone(),
        asset: secrets.asset,
        value: secrets.value,
        asset_blinding_factor: secrets.asset_bf,
        value_blinding_factor: secrets.value_bf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::testing;

    #[test]
    fn explicit_output_has_zero_factors() {
        let asset = testing::test_asset(0x11);
        let output = testing::explicit_output(asset, 1500, &testing::wallet_script(), 0);

        let unblinded = unblind_output(&output, None).unwrap();
        assert_eq!(unblinded.asset, asset);
        assert_eq!(unblinded.value, 1500);
        assert_eq!(unblinded.asset_blinding_factor, AssetBlindingFactor::zero());
        assert_eq!(unblinded.value_blinding_factor, ValueBlindingFactor::zero());
        assert!(!unblinded.is_confidential());
    }

    #[test]
    fn confidential_output_unblinds_with_wallet_key() {
        let keys = testing::WalletKeys::default();
        let asset = testing::test_asset(0x22);
        let address = keys.address(Network::LiquidTestnet);
        let (output, abf, vbf) = testing::confidential_output(asset, 4200, &address, 3);

        let unblinded = unblind_output(&output, Some(&keys.blinding_secret)).unwrap();
        assert_eq!(unblinded.asset, asset);
        assert_eq!(unblinded.value, 4200);
        assert_eq!(unblinded.asset_blinding_factor, abf);
        assert_eq!(unblinded.value_blinding_factor, vbf);
        assert!(unblinded.is_confidential());

        let secrets = unblinded.secrets();
        assert_eq!(secrets.value, 4200);
        assert_eq!(secrets.asset, asset);
    }

    #[test]
    fn confidential_output_without_key_is_an_error() {
        let keys = testing::WalletKeys::default();
        let address = keys.address(Network::LiquidTestnet);
        let (output, _, _) = testing::confidential_output(testing::test_asset(0x22), 10, &address, 0);

        assert!(matches!(unblind_output(&output, None), Err(Error::Unblind(_))));
    }

    #[test]
    fn confidential_output_with_wrong_key_is_an_error() {
        let keys = testing::WalletKeys::default();
        let address = keys.address(Network::LiquidTestnet);
        let (output, _, _) = testing::confidential_output(testing::test_asset(0x22), 10, &address, 0);

        let wrong = SecretKey::from_slice(&[0x77; 32]).unwrap();
        assert!(matches!(
            unblind_output(&output, Some(&wrong)),
            Err(Error::Unblind(_))
        ));
    }
}
