use std::path::Path;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{constants, BlockEnv};

/// Errors raised while loading a [`FactoryConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for [`FactoryConfig`].
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parameters of the staking artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StakingConfig {
    /// Reward tokens paid out per second across all stakers.
    pub reward_rate: U256,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self { reward_rate: constants::staking::DEFAULT_REWARD_RATE }
    }
}

/// Configuration of a [`MetamorphicFactory`](crate::MetamorphicFactory) and its world.
///
/// Missing fields take their default value, so `{}` is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactoryConfig {
    /// Address the factory is deployed at.
    pub factory_address: Address,
    /// Account recorded as the factory's creator.
    pub factory_deployer: Address,
    /// The block the world starts at.
    pub genesis: BlockEnv,
    /// Seconds between two mined blocks.
    pub block_time: u64,
    /// Staking artifact parameters.
    pub staking: StakingConfig,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            factory_address: constants::world::DEFAULT_FACTORY_ADDRESS,
            factory_deployer: constants::world::DEFAULT_FACTORY_DEPLOYER,
            genesis: BlockEnv::default(),
            block_time: constants::world::DEFAULT_BLOCK_TIME,
            staking: StakingConfig::default(),
        }
    }
}

impl FactoryConfig {
    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
