use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants;

/// Deployer-chosen 32-byte value that keys a deployment slot and seeds its CREATE2 address.
pub type Salt = B256;

/// Builds a salt from a small integer, left-padded like `bytes32(uint256(value))`.
pub fn salt_from_u64(value: u64) -> Salt {
    B256::from(U256::from(value))
}

/// The block the next transaction executes in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEnv {
    /// Block number.
    pub number: u64,
    /// Block timestamp in seconds.
    pub timestamp: u64,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self {
            number: constants::world::GENESIS_NUMBER,
            timestamp: constants::world::GENESIS_TIMESTAMP,
        }
    }
}

impl BlockEnv {
    /// Returns the block that follows this one after `block_time` seconds.
    ///
    /// Number and timestamp saturate at `u64::MAX`.
    pub const fn next(self, block_time: u64) -> Self {
        Self {
            number: self.number.saturating_add(1),
            timestamp: self.timestamp.saturating_add(block_time),
        }
    }
}
