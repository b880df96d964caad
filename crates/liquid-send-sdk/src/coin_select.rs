use lwk_wollet::elements::AssetId;

use crate::error::{Error, Result};
use crate::utxo::UnblindedOutpoint;

/// Outpoints chosen to cover a target, in the order they were offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    pub selected: Vec<UnblindedOutpoint>,
    pub total: u64,
}

/// First-fit selection of `asset` outpoints until `total >= target`.
///
/// Outpoints of other assets are skipped. Order is the caller's; the
/// shortest covering prefix is returned, or `InsufficientFunds` with what
/// could be collected.
pub fn select(outpoints: &[UnblindedOutpoint], asset: AssetId, target: u64) -> Result<SelectionResult> {
    let mut selected = Vec::new();
    let mut total: u64 = 0;

    for utxo in outpoints.iter().filter(|u| u.asset == asset) {
        if total >= target {
            break;
        }
        total = total.checked_add(utxo.value).ok_or(Error::AmountOverflow)?;
        selected.push(utxo.clone());
    }

    if total < target {
        return Err(Error::InsufficientFunds {
            asset,
            needed: target,
            have: total,
        });
    }

    log::debug!(
        "selected {} outpoint(s) of {asset} totalling {total} for target {target}",
        selected.len()
    );
    Ok(SelectionResult { selected, total })
}
