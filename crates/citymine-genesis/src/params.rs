use citymine_core::error::CitymineError;
use citymine_core::params::ProtocolParams;
use citymine_core::types::{Address, Balance};
use serde::{Deserialize, Serialize};

/// Starting balances for one principal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub address: Address,
    #[serde(default)]
    pub native: Balance,
    /// Tokens minted at genesis, e.g. to seed early stackers.
    #[serde(default)]
    pub token: Balance,
}

/// Everything needed to build the initial world.
///
/// Loaded from JSON on first run. Addresses are base58 strings or
/// `label:<name>` shorthands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisParams {
    /// Receives commitments and is the only principal that may hand the
    /// treasury over.
    pub city_wallet: Address,
    #[serde(default)]
    pub params: ProtocolParams,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

impl GenesisParams {
    pub fn from_json(json: &str) -> Result<Self, CitymineError> {
        serde_json::from_str(json).map_err(|e| CitymineError::Serialization(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, CitymineError> {
        serde_json::to_string_pretty(self).map_err(|e| CitymineError::Serialization(e.to_string()))
    }

    /// Local development network: one registrant activates the protocol,
    /// short cycles, and `wallet_1`..=`wallet_8` funded with both assets.
    pub fn devnet() -> Self {
        let params = ProtocolParams {
            activation_threshold: 1,
            activation_delay: 10,
            reward_cycle_length: 50,
            token_reward_maturity: 10,
            ..Default::default()
        };
        let allocations = (1..=8)
            .map(|i| Allocation {
                address: Address::from_label(&format!("wallet_{i}")),
                native: 100_000_000,
                token: 1_000_000,
            })
            .collect();
        Self { city_wallet: Address::from_label("city_wallet"), params, allocations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_takes_defaults() {
        let p = GenesisParams::from_json(r#"{ "city_wallet": "label:city_wallet" }"#).unwrap();
        assert_eq!(p.city_wallet, Address::from_label("city_wallet"));
        assert_eq!(p.params, ProtocolParams::default());
        assert!(p.allocations.is_empty());
    }

    #[test]
    fn allocations_parse() {
        let json = r#"{
            "city_wallet": "label:city_wallet",
            "params": { "activation_threshold": 2 },
            "allocations": [
                { "address": "label:wallet_1", "native": 5000 },
                { "address": "label:wallet_2", "token": 70 }
            ]
        }"#;
        let p = GenesisParams::from_json(json).unwrap();
        assert_eq!(p.params.activation_threshold, 2);
        assert_eq!(p.params.reward_cycle_length, 2_100);
        assert_eq!(p.allocations[0].native, 5_000);
        assert_eq!(p.allocations[0].token, 0);
        assert_eq!(p.allocations[1].token, 70);
    }

    #[test]
    fn devnet_survives_json() {
        let p = GenesisParams::devnet();
        let back = GenesisParams::from_json(&p.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        assert!(matches!(
            GenesisParams::from_json("{ not json"),
            Err(CitymineError::Serialization(_))
        ));
    }
}
