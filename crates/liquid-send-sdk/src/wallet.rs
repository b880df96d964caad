use std::str::FromStr;

use lwk_wollet::elements::secp256k1_zkp::{PublicKey, SecretKey, XOnlyPublicKey};
use lwk_wollet::elements::{Address, Script};

use crate::error::{Error, Result};
use crate::network::Network;

/// Identity of the wallet a transaction is built for.
///
/// Passed explicitly into building and signing; fields stay `None` until the
/// provider has handed them over.
#[derive(Debug, Clone)]
pub struct WalletContext {
    pub network: Network,
    pub address: Option<Address>,
    pub public_key: Option<PublicKey>,
    pub blinding_private_key: Option<SecretKey>,
}

impl WalletContext {
    /// An identity with nothing resolved yet.
    pub fn uninitialized(network: Network) -> Self {
        Self {
            network,
            address: None,
            public_key: None,
            blinding_private_key: None,
        }
    }

    /// Parse the strings a wallet provider reports.
    ///
    /// The network is inferred from the address encoding.
    pub fn from_provider(address: &str, public_key_hex: &str, blinding_key_hex: &str) -> Result<Self> {
        let address =
            Address::from_str(address).map_err(|e| Error::Address(format!("{address}: {e}")))?;
        let public_key = PublicKey::from_str(public_key_hex)
            .map_err(|e| Error::Key(format!("public key: {e}")))?;
        let blinding_bytes = hex::decode(blinding_key_hex.trim())
            .map_err(|e| Error::Key(format!("blinding key hex: {e}")))?;
        let blinding_private_key = SecretKey::from_slice(&blinding_bytes)
            .map_err(|e| Error::Key(format!("blinding key: {e}")))?;

        Ok(Self {
            network: Network::from_address(&address),
            address: Some(address),
            public_key: Some(public_key),
            blinding_private_key: Some(blinding_private_key),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.address.is_some() && self.public_key.is_some()
    }

    pub fn address(&self) -> Result<&Address> {
        self.address.as_ref().ok_or(Error::WalletNotInitialized)
    }

    pub fn public_key(&self) -> Result<&PublicKey> {
        self.public_key.as_ref().ok_or(Error::WalletNotInitialized)
    }

    /// Taproot internal key: the public key without its parity byte.
    pub fn x_only_public_key(&self) -> Result<XOnlyPublicKey> {
        Ok(self.public_key()?.x_only_public_key().0)
    }

    pub fn script_pubkey(&self) -> Result<Script> {
        Ok(self.address()?.script_pubkey())
    }

    pub fn blinding_private_key(&self) -> Option<&SecretKey> {
        self.blinding_private_key.as_ref()
    }
}
