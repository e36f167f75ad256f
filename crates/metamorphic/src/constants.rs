//! Constants for the metamorphic factory model.
//!
//! It groups the constants by the component that owns them.

/// Defaults for the local world the factory lives in.
pub mod world {
    use alloy_primitives::{address, Address};

    /// The account that deploys the factory in the default configuration.
    pub const DEFAULT_FACTORY_DEPLOYER: Address =
        address!("0x0000000000000000000000000000000000100000");

    /// The factory address in the default configuration.
    pub const DEFAULT_FACTORY_ADDRESS: Address =
        address!("0x0000000000000000000000000000000000fac702");

    /// Block number of the genesis block.
    pub const GENESIS_NUMBER: u64 = 0;

    /// Timestamp of the genesis block.
    pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

    /// Seconds between two mined blocks.
    pub const DEFAULT_BLOCK_TIME: u64 = 1;
}

/// Constants of the staking variants.
pub mod staking {
    use alloy_primitives::U256;

    /// Fixed-point scale of the reward-per-token accumulator.
    pub const REWARD_PRECISION: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

    /// Reward tokens paid out per second across all stakers, in the default configuration.
    pub const DEFAULT_REWARD_RATE: U256 = U256::from_limbs([100, 0, 0, 0]);
}

/// Constants of the fungible token ledger.
pub mod erc20 {
    /// Decimals reported by every token ledger.
    pub const DECIMALS: u8 = 18;
}
