//! Synthetix-style staking rewards.
//!
//! Rewards accrue at a constant rate per second, shared between stakers pro rata. The
//! `reward_per_token` accumulator only grows, so `earned` is non-decreasing in time for a fixed
//! stake.

use alloy_primitives::{map::HashMap, Address, Bytes, U256};
use alloy_sol_types::SolValue;
use metamorphic_contracts::honest_staking::IHonestStaking::IHonestStakingCalls;
use tracing::{debug, info};

use super::{decode_calldata, CallContext, ContractLogic, StakingSetup};
use crate::{constants::staking::REWARD_PRECISION, MetamorphicError, Result};

/// Per-staker bookkeeping. Lives in the private storage of one [`HonestStaking`] instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StakeRecord {
    /// The staker.
    pub staker: Address,
    /// Staked amount.
    pub amount: U256,
    /// Timestamp of the last reward update for this staker.
    pub last_update: u64,
    /// Accumulator value already accounted for in `rewards`.
    pub reward_per_token_paid: U256,
    /// Rewards earned but not yet paid out.
    pub rewards: U256,
}

impl StakeRecord {
    fn new(staker: Address) -> Self {
        Self { staker, ..Default::default() }
    }
}

/// The honest staking variant.
#[derive(Clone, Debug)]
pub struct HonestStaking {
    reward_rate: U256,
    setup: Option<StakingSetup>,
    last_update_time: u64,
    reward_per_token_stored: U256,
    total_supply: U256,
    stakes: HashMap<Address, StakeRecord>,
}

impl HonestStaking {
    /// Creates an uninitialized instance paying `reward_rate` reward tokens per second.
    pub fn new(reward_rate: U256) -> Self {
        Self {
            reward_rate,
            setup: None,
            last_update_time: 0,
            reward_per_token_stored: U256::ZERO,
            total_supply: U256::ZERO,
            stakes: HashMap::default(),
        }
    }

    /// Reward tokens paid per second.
    pub const fn reward_rate(&self) -> U256 {
        self.reward_rate
    }

    /// Total amount staked.
    pub const fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// The stake record of `staker`.
    pub fn stake_of(&self, staker: &Address) -> Option<&StakeRecord> {
        self.stakes.get(staker)
    }

    /// The accumulated reward per staked token at `now`, scaled by [`REWARD_PRECISION`].
    pub fn reward_per_token(&self, now: u64) -> Result<U256> {
        if self.total_supply.is_zero() {
            return Ok(self.reward_per_token_stored);
        }
        let elapsed = U256::from(now.saturating_sub(self.last_update_time));
        let accrued = elapsed
            .checked_mul(self.reward_rate)
            .and_then(|v| v.checked_mul(REWARD_PRECISION))
            .ok_or(MetamorphicError::ArithmeticOverflow)?
            / self.total_supply;
        self.reward_per_token_stored.checked_add(accrued).ok_or(MetamorphicError::ArithmeticOverflow)
    }

    /// The rewards `account` has earned by `now`.
    pub fn earned(&self, account: Address, now: u64) -> Result<U256> {
        let Some(record) = self.stakes.get(&account) else { return Ok(U256::ZERO) };
        let delta = self.reward_per_token(now)?.saturating_sub(record.reward_per_token_paid);
        let accrued = record
            .amount
            .checked_mul(delta)
            .ok_or(MetamorphicError::ArithmeticOverflow)?
            / REWARD_PRECISION;
        record.rewards.checked_add(accrued).ok_or(MetamorphicError::ArithmeticOverflow)
    }

    fn require_setup(&self) -> Result<StakingSetup> {
        self.setup.ok_or(MetamorphicError::NotInitialized)
    }

    /// Checkpoints the accumulator and the rewards of `account` at `now`.
    fn update_reward(&mut self, account: Address, now: u64) -> Result<&mut StakeRecord> {
        let reward_per_token = self.reward_per_token(now)?;
        let earned = self.earned(account, now)?;
        self.reward_per_token_stored = reward_per_token;
        self.last_update_time = now;

        let record = self.stakes.entry(account).or_insert_with(|| StakeRecord::new(account));
        record.rewards = earned;
        record.reward_per_token_paid = reward_per_token;
        record.last_update = now;
        Ok(record)
    }

    fn stake(&mut self, ctx: &mut CallContext<'_>, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Err(MetamorphicError::ZeroAmount);
        }
        let setup = self.require_setup()?;
        let (this, staker) = (ctx.address(), ctx.caller());

        if !ctx.ledger_mut(setup.staking_token)?.transfer_from(this, staker, this, amount)? {
            return Err(MetamorphicError::TransferFailed);
        }

        let total_supply =
            self.total_supply.checked_add(amount).ok_or(MetamorphicError::ArithmeticOverflow)?;
        let record = self.update_reward(staker, ctx.block().timestamp)?;
        record.amount += amount;
        self.total_supply = total_supply;
        debug!(%this, %staker, %amount, "Staked");
        Ok(())
    }

    fn withdraw(&mut self, ctx: &mut CallContext<'_>, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Err(MetamorphicError::ZeroAmount);
        }
        let setup = self.require_setup()?;
        let (this, staker) = (ctx.address(), ctx.caller());

        let staked = self.stakes.get(&staker).map(|r| r.amount).unwrap_or_default();
        if staked < amount {
            return Err(MetamorphicError::InsufficientStake { staked, requested: amount });
        }

        let record = self.update_reward(staker, ctx.block().timestamp)?;
        record.amount -= amount;
        self.total_supply -= amount;

        if !ctx.ledger_mut(setup.staking_token)?.transfer(this, staker, amount)? {
            return Err(MetamorphicError::TransferFailed);
        }
        debug!(%this, %staker, %amount, "Withdrew");
        Ok(())
    }

    fn get_reward(&mut self, ctx: &mut CallContext<'_>) -> Result<U256> {
        let setup = self.require_setup()?;
        let (this, staker) = (ctx.address(), ctx.caller());

        let record = self.update_reward(staker, ctx.block().timestamp)?;
        let reward = core::mem::take(&mut record.rewards);
        if !reward.is_zero() &&
            !ctx.ledger_mut(setup.rewards_token)?.transfer(this, staker, reward)?
        {
            return Err(MetamorphicError::TransferFailed);
        }
        debug!(%this, %staker, %reward, "Paid reward");
        Ok(reward)
    }
}

impl ContractLogic for HonestStaking {
    fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes> {
        let now = ctx.block().timestamp;
        let output = match decode_calldata::<IHonestStakingCalls>(input)? {
            IHonestStakingCalls::setStakingAndRewardTokens(call) => {
                StakingSetup::initialize(
                    &mut self.setup,
                    ctx,
                    call.stakingToken,
                    call.rewardsToken,
                )?;
                self.last_update_time = now;
                Vec::new()
            }
            IHonestStakingCalls::stakingToken(_) => {
                self.setup.map(|s| s.staking_token).unwrap_or_default().abi_encode()
            }
            IHonestStakingCalls::rewardsToken(_) => {
                self.setup.map(|s| s.rewards_token).unwrap_or_default().abi_encode()
            }
            IHonestStakingCalls::owner(_) => {
                self.setup.map(|s| s.owner).unwrap_or_default().abi_encode()
            }
            IHonestStakingCalls::totalSupply(_) => self.total_supply.abi_encode(),
            IHonestStakingCalls::balanceOf(call) => {
                self.stakes.get(&call.account).map(|r| r.amount).unwrap_or_default().abi_encode()
            }
            IHonestStakingCalls::rewardPerToken(_) => self.reward_per_token(now)?.abi_encode(),
            IHonestStakingCalls::earned(call) => self.earned(call.account, now)?.abi_encode(),
            IHonestStakingCalls::stake(call) => {
                self.stake(ctx, call.amount)?;
                Vec::new()
            }
            IHonestStakingCalls::withdraw(call) => {
                self.withdraw(ctx, call.amount)?;
                Vec::new()
            }
            IHonestStakingCalls::getReward(_) => {
                self.get_reward(ctx)?;
                Vec::new()
            }
            IHonestStakingCalls::kill(_) => {
                StakingSetup::only_owner(self.setup.as_ref(), ctx)?;
                let beneficiary = ctx.caller();
                info!(address = %ctx.address(), %beneficiary, "Honest staking killed");
                ctx.selfdestruct(beneficiary);
                Vec::new()
            }
        };
        Ok(output.into())
    }

    fn clone_box(&self) -> Box<dyn ContractLogic> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::SolCall;
    use metamorphic_contracts::honest_staking::IHonestStaking;

    use crate::{BlockEnv, Erc20Ledger, ExternalLedger, LedgerError, TokenLedgers};

    const THIS: Address = address!("0x00000000000000000000000000000000000057a4");
    const OWNER: Address = address!("0x000000000000000000000000000000000000a11c");
    const STAKER: Address = address!("0x0000000000000000000000000000000000000b0b");
    const STAKING_TOKEN: Address = address!("0x0000000000000000000000000000000000001111");
    const REWARDS_TOKEN: Address = address!("0x0000000000000000000000000000000000002222");

    struct Harness {
        contract: HonestStaking,
        ledgers: TokenLedgers,
        block: BlockEnv,
    }

    impl Harness {
        fn new() -> Self {
            let mut ledgers = TokenLedgers::new();
            ledgers.insert(STAKING_TOKEN, Erc20Ledger::new("Stake", "STK"));
            ledgers.insert(REWARDS_TOKEN, Erc20Ledger::new("Reward", "RWD"));
            let mut harness = Self {
                contract: HonestStaking::new(U256::from(100)),
                ledgers,
                block: BlockEnv::default(),
            };
            harness
                .send(
                    OWNER,
                    IHonestStaking::setStakingAndRewardTokensCall {
                        stakingToken: STAKING_TOKEN,
                        rewardsToken: REWARDS_TOKEN,
                    },
                )
                .unwrap();
            harness
        }

        fn send<C: SolCall>(&mut self, caller: Address, call: C) -> Result<Bytes> {
            let mut ctx = CallContext::new(THIS, caller, caller, self.block, &mut self.ledgers);
            self.contract.call(&mut ctx, &call.abi_encode())
        }

        fn fund_staker(&mut self, amount: u64) {
            let ledger = self.ledgers.get_mut(&STAKING_TOKEN).unwrap();
            ledger.mint(STAKER, U256::from(amount)).unwrap();
            ledger.approve(STAKER, THIS, U256::from(amount)).unwrap();
        }

        fn elapse(&mut self, secs: u64) {
            self.block.timestamp += secs;
        }
    }

    #[test]
    fn test_initializer_is_one_shot() {
        let mut harness = Harness::new();
        assert_eq!(harness.contract.setup.unwrap().owner, OWNER);
        let err = harness
            .send(
                STAKER,
                IHonestStaking::setStakingAndRewardTokensCall {
                    stakingToken: REWARDS_TOKEN,
                    rewardsToken: STAKING_TOKEN,
                },
            )
            .unwrap_err();
        assert!(matches!(err, MetamorphicError::AlreadyInitialized));
    }

    #[test]
    fn test_stake_requires_initialization() {
        let mut contract = HonestStaking::new(U256::from(1));
        let mut ledgers = TokenLedgers::new();
        let mut ctx = CallContext::new(THIS, STAKER, STAKER, BlockEnv::default(), &mut ledgers);
        let input = IHonestStaking::stakeCall { amount: U256::from(1) }.abi_encode();
        assert!(matches!(contract.call(&mut ctx, &input), Err(MetamorphicError::NotInitialized)));
    }

    #[test]
    fn test_stake_pulls_tokens_into_contract() {
        let mut harness = Harness::new();
        harness.fund_staker(10_000);
        harness.send(STAKER, IHonestStaking::stakeCall { amount: U256::from(10_000) }).unwrap();

        let ledger = &harness.ledgers[&STAKING_TOKEN];
        assert_eq!(ledger.balance_of(THIS), U256::from(10_000));
        assert_eq!(ledger.balance_of(STAKER), U256::ZERO);

        let output =
            harness.send(STAKER, IHonestStaking::balanceOfCall { account: STAKER }).unwrap();
        let staked = IHonestStaking::balanceOfCall::abi_decode_returns(&output).unwrap();
        assert_eq!(staked, U256::from(10_000));
        assert_eq!(harness.contract.total_supply(), U256::from(10_000));
    }

    #[test]
    fn test_stake_without_allowance_fails() {
        let mut harness = Harness::new();
        harness.ledgers.get_mut(&STAKING_TOKEN).unwrap().mint(STAKER, U256::from(5)).unwrap();
        let err =
            harness.send(STAKER, IHonestStaking::stakeCall { amount: U256::from(5) }).unwrap_err();
        assert!(matches!(
            err,
            MetamorphicError::Ledger(LedgerError::InsufficientAllowance { .. })
        ));
        assert!(harness.contract.stake_of(&STAKER).is_none());
        assert_eq!(harness.contract.total_supply(), U256::ZERO);
    }

    #[test]
    fn test_zero_stake_is_rejected() {
        let mut harness = Harness::new();
        let err = harness.send(STAKER, IHonestStaking::stakeCall { amount: U256::ZERO }).unwrap_err();
        assert!(matches!(err, MetamorphicError::ZeroAmount));
    }

    #[test]
    fn test_single_staker_earns_full_rate() {
        let mut harness = Harness::new();
        harness.fund_staker(1_000);
        harness.send(STAKER, IHonestStaking::stakeCall { amount: U256::from(1_000) }).unwrap();

        harness.elapse(10);
        let now = harness.block.timestamp;
        assert_eq!(harness.contract.earned(STAKER, now).unwrap(), U256::from(1_000));
    }

    #[test]
    fn test_withdraw_and_get_reward() {
        let mut harness = Harness::new();
        harness.fund_staker(1_000);
        harness
            .ledgers
            .get_mut(&REWARDS_TOKEN)
            .unwrap()
            .mint(THIS, U256::from(1_000_000))
            .unwrap();
        harness.send(STAKER, IHonestStaking::stakeCall { amount: U256::from(1_000) }).unwrap();
        harness.elapse(5);

        let err = harness
            .send(STAKER, IHonestStaking::withdrawCall { amount: U256::from(1_001) })
            .unwrap_err();
        assert!(matches!(err, MetamorphicError::InsufficientStake { .. }));

        harness.send(STAKER, IHonestStaking::withdrawCall { amount: U256::from(400) }).unwrap();
        assert_eq!(harness.ledgers[&STAKING_TOKEN].balance_of(STAKER), U256::from(400));

        harness.send(STAKER, IHonestStaking::getRewardCall {}).unwrap();
        assert_eq!(harness.ledgers[&REWARDS_TOKEN].balance_of(STAKER), U256::from(500));
        assert_eq!(harness.contract.stake_of(&STAKER).unwrap().rewards, U256::ZERO);
    }

    #[test]
    fn test_kill_is_owner_only() {
        let mut harness = Harness::new();
        let err = harness.send(STAKER, IHonestStaking::killCall {}).unwrap_err();
        assert!(matches!(err, MetamorphicError::Unauthorized { caller } if caller == STAKER));

        let mut ctx = CallContext::new(THIS, OWNER, OWNER, harness.block, &mut harness.ledgers);
        harness.contract.call(&mut ctx, &IHonestStaking::killCall {}.abi_encode()).unwrap();
        assert_eq!(ctx.selfdestruct_beneficiary(), Some(OWNER));
    }
}
