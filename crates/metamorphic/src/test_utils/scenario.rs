//! The staking rug-pull scenario, step by step.

use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::SolCall;
use metamorphic_contracts::{
    erc20::IERC20, evil_staking, honest_staking, honest_staking::IHonestStaking,
};

use crate::{salt_from_u64, FactoryConfig, MetamorphicFactory, Salt};

/// A factory with the two tokens of the staking scenario deployed and funded.
///
/// The owner holds [`StakingScenario::INITIAL_BALANCE`] staking tokens and the slot address is
/// pre-funded with reward tokens, so the honest contract can pay rewards as soon as it exists.
#[derive(Debug)]
pub struct StakingScenario {
    /// The factory and its world.
    pub factory: MetamorphicFactory,
    /// The salt of the staking slot.
    pub salt: Salt,
    /// The token being staked.
    pub staking_token: Address,
    /// The token rewards are paid in.
    pub rewards_token: Address,
}

impl Default for StakingScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl StakingScenario {
    /// The account deploying the tokens and the staking slot.
    pub const OWNER: Address = address!("0x000000000000000000000000000000000000a11c");

    /// Staking tokens minted to the owner.
    pub const INITIAL_BALANCE: u64 = 10_000;

    /// Reward tokens minted to the slot address.
    pub const REWARD_RESERVE: u64 = 1_000_000_000;

    /// Creates the scenario with the default configuration.
    pub fn new() -> Self {
        Self::with_config(FactoryConfig::default())
    }

    /// Creates the scenario with `config`.
    pub fn with_config(config: FactoryConfig) -> Self {
        let mut factory = MetamorphicFactory::new(config);
        let salt = salt_from_u64(1);
        let staking_token = factory.deploy_token(Self::OWNER, "Honest Token", "HON").unwrap();
        let rewards_token = factory.deploy_token(Self::OWNER, "Reward Token", "RWD").unwrap();
        factory.mint(staking_token, Self::OWNER, U256::from(Self::INITIAL_BALANCE)).unwrap();
        let slot = factory.get_metamorphic_contract_address(salt);
        factory.mint(rewards_token, slot, U256::from(Self::REWARD_RESERVE)).unwrap();
        Self { factory, salt, staking_token, rewards_token }
    }

    /// The address of the staking slot.
    pub fn address(&self) -> Address {
        self.factory.get_metamorphic_contract_address(self.salt)
    }

    /// Initializer calldata shared by both staking variants.
    pub fn init_calldata(&self) -> Bytes {
        IHonestStaking::setStakingAndRewardTokensCall {
            stakingToken: self.staking_token,
            rewardsToken: self.rewards_token,
        }
        .abi_encode()
        .into()
    }

    /// Deploys and initializes the honest variant as the owner.
    pub fn deploy_honest(&mut self) -> Address {
        let calldata = self.init_calldata();
        self.factory.deploy(Self::OWNER, self.salt, honest_staking::CODE, calldata).unwrap()
    }

    /// Redeploys the killed slot with the evil variant, initialized as the owner.
    pub fn redeploy_evil(&mut self) -> Address {
        let calldata = self.init_calldata();
        self.factory.redeploy(Self::OWNER, self.salt, evil_staking::CODE, calldata).unwrap()
    }

    /// Approves the slot for `amount` and stakes it, both from `staker`.
    pub fn approve_and_stake(&mut self, staker: Address, amount: U256) {
        let address = self.address();
        let approved = self
            .factory
            .call_typed(staker, self.staking_token, &IERC20::approveCall { spender: address, amount })
            .unwrap();
        assert!(approved);
        self.factory.call_typed(staker, address, &IHonestStaking::stakeCall { amount }).unwrap();
    }

    /// Kills the slot as the owner.
    pub fn kill(&mut self) {
        let address = self.address();
        self.factory.kill(Self::OWNER, address).unwrap();
    }

    /// The staking token balance of `owner`.
    pub fn staking_balance(&self, owner: Address) -> U256 {
        self.factory.balance_of(self.staking_token, owner).unwrap()
    }
}
