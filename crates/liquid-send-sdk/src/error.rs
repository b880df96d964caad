use lwk_wollet::elements::AssetId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("insufficient funds for asset {asset}: need {needed} sats, have {have} sats")]
    InsufficientFunds {
        asset: AssetId,
        needed: u64,
        have: u64,
    },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("amount arithmetic overflow")]
    AmountOverflow,

    #[error("conservation check failed for asset {asset}: inputs {inputs}, outputs {outputs}")]
    ConservationViolation {
        asset: AssetId,
        inputs: u64,
        outputs: u64,
    },

    #[error("blinding data of input {index} does not open its commitment: {reason}")]
    BlindingValidationFailed { index: usize, reason: String },

    #[error("blinding error: {0}")]
    Blinding(String),

    #[error("amount proof verification failed: {0}")]
    Verification(String),

    #[error("wallet not initialized")]
    WalletNotInitialized,

    #[error("signer rejected the request: {0}")]
    SignerRejected(String),

    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("PSET construction error: {0}")]
    Pset(String),

    #[error("finalize error: {0}")]
    Finalize(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid address: {0}")]
    Address(String),

    #[error("invalid key: {0}")]
    Key(String),

    #[error("cannot unblind output: {0}")]
    Unblind(String),

    #[error("chain source error: {0}")]
    Chain(String),

    #[error("broadcast error: {0}")]
    Broadcast(String),
}

pub type Result<T> = std::result::Result<T, Error>;
