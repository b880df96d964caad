use std::future::Future;

use liquid_send_sdk::{Error as SdkError, PsetSigner, WalletContext};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RetryPolicy;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("liquid provider not found")]
    NotFound,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

/// Identity strings a provider reports for the active account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAddress {
    pub address: String,
    pub public_key: String,
    pub blinding_private_key: String,
}

/// Reply to `sign_pset`. Providers omit `signed` when they refuse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub signed: Option<String>,
}

/// An injected wallet that holds the spend keys.
pub trait LiquidProvider: Send + Sync {
    fn enable(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn get_address(&self) -> impl Future<Output = Result<ProviderAddress, ProviderError>> + Send;

    fn sign_pset(
        &self,
        pset_base64: &str,
    ) -> impl Future<Output = Result<SignResponse, ProviderError>> + Send;
}

/// Detect a provider, retrying while it has not been injected yet, then
/// enable it.
pub async fn enable_with_retry<P, F>(mut detect: F, policy: RetryPolicy) -> Result<P, ProviderError>
where
    P: LiquidProvider,
    F: FnMut() -> Result<P, ProviderError>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match detect() {
            Ok(provider) => {
                provider.enable().await?;
                log::info!("liquid provider enabled after {attempt} attempt(s)");
                return Ok(provider);
            }
            Err(e) => {
                log::debug!("provider detection failed ({attempt}/{attempts}): {e}");
                if attempt < attempts {
                    tokio::time::sleep(policy.delay()).await;
                }
            }
        }
    }
    Err(ProviderError::NotFound)
}

/// Resolve the wallet identity the provider reports.
pub async fn wallet_context<P: LiquidProvider>(provider: &P) -> Result<WalletContext, SdkError> {
    let reported = provider
        .get_address()
        .await
        .map_err(|e| SdkError::SignerUnavailable(e.to_string()))?;
    WalletContext::from_provider(
        &reported.address,
        &reported.public_key,
        &reported.blinding_private_key,
    )
}

pub const ENV_ADDRESS: &str = "LIQUID_SEND_ADDRESS";
pub const ENV_PUBLIC_KEY: &str = "LIQUID_SEND_PUBLIC_KEY";
pub const ENV_BLINDING_KEY: &str = "LIQUID_SEND_BLINDING_KEY";

/// A provider that only reports an identity taken from the environment and
/// refuses to sign.
#[derive(Debug, Clone)]
pub struct WatchOnlyProvider {
    identity: ProviderAddress,
}

impl WatchOnlyProvider {
    pub fn new(identity: ProviderAddress) -> Self {
        Self { identity }
    }

    /// `NotFound` until all of `LIQUID_SEND_ADDRESS`, `LIQUID_SEND_PUBLIC_KEY`
    /// and `LIQUID_SEND_BLINDING_KEY` are set.
    pub fn from_env() -> Result<Self, ProviderError> {
        let var = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or(ProviderError::NotFound)
        };
        Ok(Self::new(ProviderAddress {
            address: var(ENV_ADDRESS)?,
            public_key: var(ENV_PUBLIC_KEY)?,
            blinding_private_key: var(ENV_BLINDING_KEY)?,
        }))
    }
}

impl LiquidProvider for WatchOnlyProvider {
    async fn enable(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn get_address(&self) -> Result<ProviderAddress, ProviderError> {
        Ok(self.identity.clone())
    }

    async fn sign_pset(&self, _pset_base64: &str) -> Result<SignResponse, ProviderError> {
        Err(ProviderError::Rejected("watch-only wallet cannot sign".into()))
    }
}

/// Lets a provider act as the signer of the send pipeline.
pub struct ProviderSigner<P> {
    provider: P,
}

impl<P: LiquidProvider> ProviderSigner<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: LiquidProvider> PsetSigner for ProviderSigner<P> {
    async fn sign_pset(&self, pset_base64: &str) -> liquid_send_sdk::Result<String> {
        match self.provider.sign_pset(pset_base64).await {
            Ok(SignResponse { signed: Some(signed) }) => Ok(signed),
            Ok(SignResponse { signed: None }) => {
                Err(SdkError::SignerRejected("signPset returned no signed PSET".into()))
            }
            Err(ProviderError::Rejected(reason)) => Err(SdkError::SignerRejected(reason)),
            Err(e) => Err(SdkError::SignerUnavailable(e.to_string())),
        }
    }
}
