pub mod blind;
pub mod builder;
pub mod chain;
pub mod coin_select;
pub mod error;
pub mod fee;
pub mod network;
pub mod pipeline;
pub mod sign;
pub mod skeleton;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utxo;
pub mod wallet;

// Core types
pub use error::{Error, Result};
pub use network::Network;
pub use wallet::WalletContext;

// Unblinding and history
pub use chain::{ChainSource, HistoryEntry};
pub use pipeline::{HistoryCache, balances, compute_utxos, derive_unblinded_outpoints};
pub use utxo::{UnblindedOutpoint, WalletOutput, unblind_output};

// Building
pub use builder::{BuiltTransaction, DEFAULT_BLINDER_INDEX, SendRequest, TransactionBuilder};
pub use coin_select::{SelectionResult, select};
pub use fee::{BASE_FEE_SAT, CROSS_ASSET_MULTIPLIER_TENTHS, FeePolicy};
pub use skeleton::{InputDescriptor, OutputDescriptor, SIGHASH_DEFAULT, TxSkeleton};

// Blinding and signing
pub use blind::blind;
pub use sign::{
    KeySpendSighash, PsetSigner, finalize_pset, mark_wallet_inputs, pset_from_base64,
    pset_to_base64, sign_and_finalize,
};

// Re-export LWK for app-layer use
pub use lwk_wollet;
pub use lwk_wollet::elements;
