use serde::{Deserialize, Serialize};

use crate::coinbase::CoinbaseSchedule;
use crate::constants::{
    ACTIVATION_DELAY, ACTIVATION_THRESHOLD, BPS_DENOMINATOR, MAX_REWARD_CYCLES,
    REWARD_CYCLE_LENGTH, SPLIT_CITY_BPS, TOKEN_REWARD_MATURITY,
};
use crate::error::CitymineError;
use crate::types::Balance;

/// Tunable protocol parameters. Missing JSON fields take the defaults from
/// `constants.rs`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    pub activation_threshold: u32,
    pub activation_delay: u64,
    pub reward_cycle_length: u64,
    pub token_reward_maturity: u64,
    pub max_lock_period: u32,
    /// City share of a commitment (basis points) when the cycle has stackers.
    pub split_city_bps: u32,
    pub coinbase: CoinbaseSchedule,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            activation_threshold: ACTIVATION_THRESHOLD,
            activation_delay: ACTIVATION_DELAY,
            reward_cycle_length: REWARD_CYCLE_LENGTH,
            token_reward_maturity: TOKEN_REWARD_MATURITY,
            max_lock_period: MAX_REWARD_CYCLES,
            split_city_bps: SPLIT_CITY_BPS,
            coinbase: CoinbaseSchedule::default(),
        }
    }
}

impl ProtocolParams {
    pub fn from_json(json: &str) -> Result<Self, CitymineError> {
        let params: Self =
            serde_json::from_str(json).map_err(|e| CitymineError::Serialization(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), CitymineError> {
        if self.activation_threshold == 0 {
            return Err(CitymineError::InvalidParams("activation_threshold must be > 0".into()));
        }
        if self.reward_cycle_length == 0 {
            return Err(CitymineError::InvalidParams("reward_cycle_length must be > 0".into()));
        }
        if self.max_lock_period == 0 {
            return Err(CitymineError::InvalidParams("max_lock_period must be > 0".into()));
        }
        if self.split_city_bps > BPS_DENOMINATOR {
            return Err(CitymineError::InvalidParams(format!(
                "split_city_bps must be <= {BPS_DENOMINATOR}, got {}",
                self.split_city_bps
            )));
        }
        Ok(())
    }

    /// City share of `amount`: floor(amount × split_city_bps / 10000).
    pub fn city_share(&self, amount: Balance) -> Balance {
        amount * self.split_city_bps as Balance / BPS_DENOMINATOR as Balance
    }
}
