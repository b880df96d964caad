use lwk_wollet::elements::AssetId;
use serde::{Deserialize, Serialize};

/// Flat fee, in sats, for a small one-recipient transaction.
pub const BASE_FEE_SAT: u64 = 260;

/// Multiplier (in tenths) applied when the fee needs its own input and change.
pub const CROSS_ASSET_MULTIPLIER_TENTHS: u64 = 17;

/// Fixed fee schedule. There is no fee-rate lookup; the base fee covers a
/// conservative transaction size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePolicy {
    pub base_fee_sat: u64,
    pub cross_asset_multiplier_tenths: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            base_fee_sat: BASE_FEE_SAT,
            cross_asset_multiplier_tenths: CROSS_ASSET_MULTIPLIER_TENTHS,
        }
    }
}

impl FeePolicy {
    /// Fee for sending `asset` while paying in `fee_asset`.
    ///
    /// Cross-asset fees are rounded up so the wallet never underpays.
    pub fn fee_for(&self, asset: AssetId, fee_asset: AssetId) -> u64 {
        if asset == fee_asset {
            return self.base_fee_sat;
        }
        let scaled = self
            .base_fee_sat
            .saturating_mul(self.cross_asset_multiplier_tenths);
        scaled.div_ceil(10)
    }
}
