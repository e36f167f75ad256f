//! Staking logic that drains whatever the staking ledger credits to its address.

use alloy_primitives::Bytes;
use alloy_sol_types::SolValue;
use metamorphic_contracts::evil_staking::IEvilStaking::IEvilStakingCalls;
use tracing::{info, warn};

use super::{decode_calldata, CallContext, ContractLogic, StakingSetup};
use crate::{MetamorphicError, Result};

/// The adversarial variant installed over a killed staking contract.
///
/// It shares the honest initializer, so the same deployment script brings it up. It keeps no
/// stake records and reads the staking ledger balance of its own address instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvilStaking {
    setup: Option<StakingSetup>,
}

impl EvilStaking {
    /// Creates an uninitialized instance.
    pub const fn new() -> Self {
        Self { setup: None }
    }

    fn require_setup(&self) -> Result<StakingSetup> {
        self.setup.ok_or(MetamorphicError::NotInitialized)
    }
}

impl ContractLogic for EvilStaking {
    fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes> {
        let output = match decode_calldata::<IEvilStakingCalls>(input)? {
            IEvilStakingCalls::setStakingAndRewardTokens(call) => {
                StakingSetup::initialize(
                    &mut self.setup,
                    ctx,
                    call.stakingToken,
                    call.rewardsToken,
                )?;
                Vec::new()
            }
            IEvilStakingCalls::stakingToken(_) => {
                self.setup.map(|s| s.staking_token).unwrap_or_default().abi_encode()
            }
            IEvilStakingCalls::rewardsToken(_) => {
                self.setup.map(|s| s.rewards_token).unwrap_or_default().abi_encode()
            }
            IEvilStakingCalls::owner(_) => {
                self.setup.map(|s| s.owner).unwrap_or_default().abi_encode()
            }
            IEvilStakingCalls::checkStakedBalance(_) => {
                let setup = self.require_setup()?;
                ctx.ledger(setup.staking_token)?.balance_of(ctx.address()).abi_encode()
            }
            IEvilStakingCalls::stealTokens(call) => {
                StakingSetup::only_owner(self.setup.as_ref(), ctx)?;
                let setup = self.require_setup()?;
                let this = ctx.address();
                let ledger = ctx.ledger_mut(setup.staking_token)?;
                let amount = ledger.balance_of(this);
                if !ledger.transfer(this, call.destination, amount)? {
                    return Err(MetamorphicError::TransferFailed);
                }
                warn!(%this, destination = %call.destination, %amount, "Drained staked tokens");
                Vec::new()
            }
            IEvilStakingCalls::kill(_) => {
                StakingSetup::only_owner(self.setup.as_ref(), ctx)?;
                let beneficiary = ctx.caller();
                info!(address = %ctx.address(), %beneficiary, "Evil staking killed");
                ctx.selfdestruct(beneficiary);
                Vec::new()
            }
        };
        Ok(output.into())
    }

    fn clone_box(&self) -> Box<dyn ContractLogic> {
        Box::new(*self)
    }
}
