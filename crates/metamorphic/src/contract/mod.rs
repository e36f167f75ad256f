//! Logic installed at contract addresses.
//!
//! An installed contract is a [`ContractLogic`] trait object chosen by the hash of the runtime
//! code being deployed. Callers only ever reach it through ABI calldata, so two variants that share
//! a selector are indistinguishable except by what they return.
//!
//! Each instance owns its private storage. Self-destruction drops the instance, and a
//! redeployment always starts from a fresh one, even at the same address with the same code.

use core::fmt::Debug;
use std::sync::Arc;

use alloy_primitives::{keccak256, map::HashMap, Address, Bytes, Selector, B256};
use alloy_sol_types::SolInterface;
use metamorphic_contracts::{evil_staking, honest_staking};

use crate::{
    BlockEnv, ExternalLedger, LedgerHost, MetamorphicError, Result, StakingConfig,
};

mod adversarial;
pub use adversarial::*;

mod honest;
pub use honest::*;

/// Behavior installed at an address.
pub trait ContractLogic: Debug + Send + Sync {
    /// Executes ABI-encoded `input` and returns the ABI-encoded output.
    ///
    /// To self-destruct, the logic calls [`CallContext::selfdestruct`]. The world applies the
    /// destruction once the call returns successfully.
    fn call(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes>;

    /// Clones the instance, private storage included.
    fn clone_box(&self) -> Box<dyn ContractLogic>;
}

impl Clone for Box<dyn ContractLogic> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The environment of one call into a contract.
#[derive(Debug)]
pub struct CallContext<'a> {
    address: Address,
    caller: Address,
    origin: Address,
    block: BlockEnv,
    ledgers: &'a mut dyn LedgerHost,
    selfdestruct: Option<Address>,
}

impl<'a> CallContext<'a> {
    /// Creates the context of a call from `caller` into `address`, in a transaction sent by
    /// `origin`.
    pub fn new(
        address: Address,
        caller: Address,
        origin: Address,
        block: BlockEnv,
        ledgers: &'a mut dyn LedgerHost,
    ) -> Self {
        Self { address, caller, origin, block, ledgers, selfdestruct: None }
    }

    /// The address of the executing contract (`address(this)`).
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The immediate caller (`msg.sender`).
    pub const fn caller(&self) -> Address {
        self.caller
    }

    /// The account that sent the transaction (`tx.origin`).
    pub const fn origin(&self) -> Address {
        self.origin
    }

    /// The block being executed.
    pub const fn block(&self) -> BlockEnv {
        self.block
    }

    /// Returns the ledger of `token`.
    pub fn ledger(&self, token: Address) -> Result<&dyn ExternalLedger> {
        self.ledgers.ledger(token).ok_or(MetamorphicError::UnknownToken(token))
    }

    /// Returns the ledger of `token` for mutation.
    pub fn ledger_mut(&mut self, token: Address) -> Result<&mut dyn ExternalLedger> {
        self.ledgers.ledger_mut(token).ok_or(MetamorphicError::UnknownToken(token))
    }

    /// Schedules the destruction of the executing contract, sending its native balance to
    /// `beneficiary`.
    pub fn selfdestruct(&mut self, beneficiary: Address) {
        self.selfdestruct = Some(beneficiary);
    }

    /// The beneficiary of a scheduled self-destruction.
    pub const fn selfdestruct_beneficiary(&self) -> Option<Address> {
        self.selfdestruct
    }
}

/// Extracts the function selector of `input`.
pub fn calldata_selector(input: &[u8]) -> Result<Selector> {
    input
        .get(..4)
        .map(Selector::from_slice)
        .ok_or(MetamorphicError::ShortCalldata(input.len()))
}

/// Decodes `input` as a call of interface `I`.
///
/// Selectors outside of `I` are reported as [`MetamorphicError::UnknownSelector`] rather than as
/// a decoding failure.
pub fn decode_calldata<I: SolInterface>(input: &[u8]) -> Result<I> {
    let selector = calldata_selector(input)?;
    if !I::valid_selector(selector.0) {
        return Err(MetamorphicError::UnknownSelector(selector));
    }
    Ok(I::abi_decode(input)?)
}

/// Token configuration written by the staking initializer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StakingSetup {
    pub(crate) staking_token: Address,
    pub(crate) rewards_token: Address,
    pub(crate) owner: Address,
}

impl StakingSetup {
    /// Runs the one-shot `setStakingAndRewardTokens` initializer. The transaction origin becomes
    /// the owner.
    pub(crate) fn initialize(
        setup: &mut Option<Self>,
        ctx: &CallContext<'_>,
        staking_token: Address,
        rewards_token: Address,
    ) -> Result<Self> {
        if setup.is_some() {
            return Err(MetamorphicError::AlreadyInitialized);
        }
        Ok(*setup.insert(Self { staking_token, rewards_token, owner: ctx.origin() }))
    }

    /// Fails with [`MetamorphicError::Unauthorized`] unless the caller is the owner.
    pub(crate) fn only_owner(setup: Option<&Self>, ctx: &CallContext<'_>) -> Result<()> {
        match setup {
            Some(setup) if setup.owner == ctx.caller() => Ok(()),
            _ => Err(MetamorphicError::Unauthorized { caller: ctx.caller() }),
        }
    }
}

/// Logic installed for runtime code no artifact is registered for. Rejects every selector.
#[derive(Clone, Copy, Debug, Default)]
pub struct InertContract;

impl ContractLogic for InertContract {
    fn call(&mut self, _ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes> {
        if input.is_empty() {
            return Ok(Bytes::new());
        }
        Err(MetamorphicError::UnknownSelector(calldata_selector(input)?))
    }

    fn clone_box(&self) -> Box<dyn ContractLogic> {
        Box::new(*self)
    }
}

/// Constructor of a fresh contract instance.
pub type LogicConstructor = Arc<dyn Fn() -> Box<dyn ContractLogic> + Send + Sync>;

/// Maps runtime code hashes to the logic they install.
#[derive(Clone, Default, derive_more::Debug)]
pub struct ArtifactRegistry {
    names: HashMap<B256, &'static str>,
    #[debug(ignore)]
    constructors: HashMap<B256, LogicConstructor>,
}

impl ArtifactRegistry {
    /// Creates an empty registry. Every code installs [`InertContract`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry knowing the honest and evil staking artifacts.
    pub fn with_builtins(staking: &StakingConfig) -> Self {
        let reward_rate = staking.reward_rate;
        let mut registry = Self::new();
        registry.register("HonestStaking", &honest_staking::CODE, move || {
            Box::new(HonestStaking::new(reward_rate))
        });
        registry.register("EvilStaking", &evil_staking::CODE, || Box::new(EvilStaking::new()));
        registry
    }

    /// Registers `constructor` for `code` and returns the code hash.
    pub fn register(
        &mut self,
        name: &'static str,
        code: &Bytes,
        constructor: impl Fn() -> Box<dyn ContractLogic> + Send + Sync + 'static,
    ) -> B256 {
        let code_hash = keccak256(code);
        self.names.insert(code_hash, name);
        self.constructors.insert(code_hash, Arc::new(constructor));
        code_hash
    }

    /// The name of the artifact with `code_hash`.
    pub fn name_of(&self, code_hash: &B256) -> Option<&'static str> {
        self.names.get(code_hash).copied()
    }

    /// Creates a fresh instance for `code_hash`.
    pub fn instantiate(&self, code_hash: &B256) -> Box<dyn ContractLogic> {
        self.constructors
            .get(code_hash)
            .map_or_else(|| Box::new(InertContract) as Box<dyn ContractLogic>, |ctor| ctor())
    }
}
