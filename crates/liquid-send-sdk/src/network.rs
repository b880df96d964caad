use lwk_wollet::ElementsNetwork;
use lwk_wollet::elements::{Address, AddressParams, AssetId, Txid};
use serde::{Deserialize, Serialize};

/// Network variants for Liquid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Liquid,
    LiquidTestnet,
    LiquidRegtest,
}

impl Network {
    pub fn into_lwk(self) -> ElementsNetwork {
        match self {
            Network::Liquid => ElementsNetwork::Liquid,
            Network::LiquidTestnet => ElementsNetwork::LiquidTestnet,
            Network::LiquidRegtest => ElementsNetwork::default_regtest(),
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Liquid)
    }

    /// The asset network fees are paid in (L-BTC).
    pub fn policy_asset(self) -> AssetId {
        self.into_lwk().policy_asset()
    }

    pub fn default_electrum_url(self) -> &'static str {
        match self {
            Network::Liquid => "ssl://blockstream.info:995",
            Network::LiquidTestnet => "ssl://blockstream.info:465",
            Network::LiquidRegtest => "tcp://localhost:50001",
        }
    }

    pub fn explorer_url(self) -> &'static str {
        match self {
            Network::Liquid => "https://liquid.network",
            Network::LiquidTestnet => "https://liquid.network/testnet",
            Network::LiquidRegtest => "http://localhost:5001",
        }
    }

    pub fn tx_url(self, txid: &Txid) -> String {
        format!("{}/tx/{}", self.explorer_url(), txid)
    }

    pub fn address_params(self) -> &'static AddressParams {
        match self {
            Network::Liquid => &AddressParams::LIQUID,
            Network::LiquidTestnet => &AddressParams::LIQUID_TESTNET,
            Network::LiquidRegtest => &AddressParams::ELEMENTS,
        }
    }

    /// Infer the network an address was encoded for.
    pub fn from_address(address: &Address) -> Self {
        if address.params.bech_hrp == AddressParams::LIQUID.bech_hrp {
            Network::Liquid
        } else if address.params.bech_hrp == AddressParams::LIQUID_TESTNET.bech_hrp {
            Network::LiquidTestnet
        } else {
            Network::LiquidRegtest
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Liquid => "liquid",
            Network::LiquidTestnet => "liquid-testnet",
            Network::LiquidRegtest => "liquid-regtest",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "liquid" => Ok(Network::Liquid),
            "testnet" | "liquid-testnet" | "liquidtestnet" => Ok(Network::LiquidTestnet),
            "regtest" | "liquid-regtest" | "liquidregtest" => Ok(Network::LiquidRegtest),
            _ => Err(format!("invalid network: {}", s)),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lwk_wollet::elements::hashes::Hash;

    #[test]
    fn parses_aliases() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Liquid);
        assert_eq!("Liquid-Testnet".parse::<Network>().unwrap(), Network::LiquidTestnet);
        assert_eq!("regtest".parse::<Network>().unwrap(), Network::LiquidRegtest);
        assert!("bitcoin".parse::<Network>().is_err());
    }

    #[test]
    fn as_str_parses_back() {
        for n in [Network::Liquid, Network::LiquidTestnet, Network::LiquidRegtest] {
            assert_eq!(n.as_str().parse::<Network>().unwrap(), n);
        }
    }

    #[test]
    fn tx_url_uses_explorer_base() {
        let txid = Txid::all_zeros();
        let url = Network::LiquidTestnet.tx_url(&txid);
        assert!(url.starts_with("https://liquid.network/testnet/tx/"));
        assert!(url.ends_with(&"0".repeat(64)));
        assert!(Network::Liquid.tx_url(&txid).starts_with("https://liquid.network/tx/"));
    }

    #[test]
    fn policy_assets_differ_between_mainnet_and_testnet() {
        assert_ne!(
            Network::Liquid.policy_asset(),
            Network::LiquidTestnet.policy_asset()
        );
    }

    #[test]
    fn deserializes_kebab_case() {
        let n: Network = serde_json::from_str("\"liquid-testnet\"").unwrap();
        assert_eq!(n, Network::LiquidTestnet);
    }
}
