//! The world the factory and its contracts live in.
//!
//! Accounts carry revm [`AccountInfo`] (balance, nonce, code). Executable behavior lives next to
//! them as [`ContractLogic`] instances, keyed by the same address. Self-destruction follows the
//! pre-Cancun rules: the account is removed entirely, code, nonce and private storage included.

use core::mem;

use alloy_primitives::{map::HashMap, Address, Bytes, B256, U256};
use delegate::delegate;
use revm::{
    primitives::KECCAK_EMPTY,
    state::{AccountInfo, Bytecode},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    BlockEnv, CallContext, ContractLogic, DeploymentRegistry, DeploymentSlot, Erc20Ledger,
    MetamorphicError, Result, Salt, TokenLedgers,
};

/// A contract creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrace {
    /// The account that executed the creation.
    pub creator: Address,
    /// The created address.
    pub address: Address,
    /// The init code the contract was created with.
    pub init_code: Bytes,
    /// The runtime code installed by the creation.
    pub runtime_code: Bytes,
    /// Hash of `runtime_code`.
    pub code_hash: B256,
    /// The CREATE2 salt, or `None` for plain CREATE.
    pub salt: Option<Salt>,
    /// The block the creation happened in.
    pub block: BlockEnv,
}

/// A self-destruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfDestructTrace {
    /// The destroyed address.
    pub address: Address,
    /// The recipient of the native balance.
    pub beneficiary: Address,
    /// The native balance sent to `beneficiary`.
    pub refunded: U256,
    /// The block the destruction happened in.
    pub block: BlockEnv,
}

/// A state transition recorded by the world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StateTrace {
    /// A contract creation.
    Create(CreateTrace),
    /// A self-destruction.
    SelfDestruct(SelfDestructTrace),
}

/// Accounts, installed logic, token ledgers and the deployment registry.
///
/// Operations are sequential. [`World::transact`] checkpoints the whole state and restores it when
/// the operation fails.
#[derive(Clone, Debug, Default)]
pub struct World {
    block: BlockEnv,
    accounts: HashMap<Address, AccountInfo>,
    instances: HashMap<Address, Box<dyn ContractLogic>>,
    ledgers: TokenLedgers,
    registry: DeploymentRegistry,
    traces: Vec<StateTrace>,
}

impl World {
    /// Creates an empty world starting at `block`.
    pub fn new(block: BlockEnv) -> Self {
        Self { block, ..Default::default() }
    }

    delegate! {
        to self.registry {
            /// Returns the slot of `salt`.
            pub fn lookup(&self, salt: &Salt) -> Option<DeploymentSlot>;
            /// Returns the slot bound to `address`.
            pub fn lookup_by_address(&self, address: &Address) -> Option<DeploymentSlot>;
        }
    }

    /// The block the next operation executes in.
    pub const fn block(&self) -> BlockEnv {
        self.block
    }

    /// Advances to the next block, `block_time` seconds later.
    pub fn mine(&mut self, block_time: u64) -> BlockEnv {
        self.block = self.block.next(block_time);
        debug!(number = self.block.number, timestamp = self.block.timestamp, "Mined block");
        self.block
    }

    /// Moves the clock forward by `secs` without producing a block. Saturates at `u64::MAX`.
    pub fn advance_time(&mut self, secs: u64) {
        self.block.timestamp = self.block.timestamp.saturating_add(secs);
    }

    /// The deployment registry.
    pub const fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut DeploymentRegistry {
        &mut self.registry
    }

    /// The account at `address`.
    pub fn account(&self, address: &Address) -> Option<&AccountInfo> {
        self.accounts.get(address)
    }

    /// The native balance of `address`.
    pub fn native_balance(&self, address: &Address) -> U256 {
        self.accounts.get(address).map(|account| account.balance).unwrap_or_default()
    }

    /// The nonce of `address`.
    pub fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|account| account.nonce).unwrap_or_default()
    }

    /// The hash of the code at `address`, [`KECCAK_EMPTY`] when there is none.
    pub fn code_hash(&self, address: &Address) -> B256 {
        self.accounts.get(address).map_or(KECCAK_EMPTY, |account| account.code_hash)
    }

    /// The runtime code at `address`.
    pub fn code(&self, address: &Address) -> Option<Bytes> {
        self.accounts
            .get(address)
            .and_then(|account| account.code.as_ref())
            .map(Bytecode::original_bytes)
            .filter(|code| !code.is_empty())
    }

    /// Whether `address` holds code.
    pub fn has_code(&self, address: &Address) -> bool {
        self.code_hash(address) != KECCAK_EMPTY
    }

    /// Credits `amount` of native currency to `address`.
    pub fn fund(&mut self, address: Address, amount: U256) -> Result<()> {
        let account = self.accounts.entry(address).or_default();
        account.balance =
            account.balance.checked_add(amount).ok_or(MetamorphicError::ArithmeticOverflow)?;
        debug!(%address, %amount, "Funded account");
        Ok(())
    }

    /// All token ledgers.
    pub const fn ledgers(&self) -> &TokenLedgers {
        &self.ledgers
    }

    /// The ledger of the token deployed at `token`.
    pub fn ledger(&self, token: &Address) -> Option<&Erc20Ledger> {
        self.ledgers.get(token)
    }

    /// The ledger of the token deployed at `token`, for mutation.
    pub fn ledger_mut(&mut self, token: &Address) -> Option<&mut Erc20Ledger> {
        self.ledgers.get_mut(token)
    }

    pub(crate) fn insert_ledger(&mut self, token: Address, ledger: Erc20Ledger) {
        self.ledgers.insert(token, ledger);
    }

    /// Every recorded state transition, oldest first.
    pub fn traces(&self) -> &[StateTrace] {
        &self.traces
    }

    /// The creations of `address`, oldest first.
    pub fn create_traces<'a>(
        &'a self,
        address: &'a Address,
    ) -> impl Iterator<Item = &'a CreateTrace> + 'a {
        self.traces.iter().filter_map(move |trace| match trace {
            StateTrace::Create(create) if create.address == *address => Some(create),
            _ => None,
        })
    }

    /// Creates the account at `address` with `runtime_code` and returns the code hash.
    ///
    /// A balance already sitting at `address` is kept. The creator's nonce is bumped.
    pub(crate) fn create_account(
        &mut self,
        creator: Address,
        address: Address,
        init_code: Bytes,
        runtime_code: Bytes,
        salt: Option<Salt>,
    ) -> B256 {
        let bytecode = Bytecode::new_legacy(runtime_code.clone());
        let code_hash = bytecode.hash_slow();

        let creator_account = self.accounts.entry(creator).or_default();
        creator_account.nonce += 1;

        let account = self.accounts.entry(address).or_default();
        account.nonce = 1;
        account.code_hash = code_hash;
        account.code = Some(bytecode);

        self.traces.push(StateTrace::Create(CreateTrace {
            creator,
            address,
            init_code,
            runtime_code,
            code_hash,
            salt,
            block: self.block,
        }));
        debug!(%creator, %address, %code_hash, "Created account");
        code_hash
    }

    /// Installs `logic` at `address`, replacing any previous instance.
    pub(crate) fn install(&mut self, address: Address, logic: Box<dyn ContractLogic>) {
        self.instances.insert(address, logic);
    }

    /// Whether logic is installed at `address`.
    pub fn is_installed(&self, address: &Address) -> bool {
        self.instances.contains_key(address)
    }

    /// Runs `op` against the world. When it fails, every change it made is discarded.
    ///
    /// Traces are append-only, so they are journaled by length instead of being copied into the
    /// checkpoint.
    pub fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let traces = mem::take(&mut self.traces);
        let journal_len = traces.len();
        let checkpoint = self.clone();
        self.traces = traces;
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                debug!(
                    %err,
                    reverted_traces = self.traces.len().saturating_sub(journal_len),
                    "Operation failed, reverting to checkpoint"
                );
                let mut traces = mem::take(&mut self.traces);
                traces.truncate(journal_len);
                *self = checkpoint;
                self.traces = traces;
                Err(err)
            }
        }
    }

    /// Sends `input` from `caller` to `to` in a transaction originated by `origin`.
    ///
    /// The call reaches the logic installed at `to`, or the token ledger deployed there.
    /// A self-destruction requested by the logic is applied once it returns.
    ///
    /// Changes are not rolled back on failure. Wrap the call in [`World::transact`] for that.
    pub fn call(
        &mut self,
        origin: Address,
        caller: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes> {
        debug!(%origin, %caller, %to, input_len = input.len(), "Call");
        if let Some(instance) = self.instances.get_mut(&to) {
            let mut ctx = CallContext::new(to, caller, origin, self.block, &mut self.ledgers);
            let output = instance.call(&mut ctx, input)?;
            if let Some(beneficiary) = ctx.selfdestruct_beneficiary() {
                self.self_destruct(to, beneficiary)?;
            }
            return Ok(output);
        }
        if let Some(ledger) = self.ledgers.get_mut(&to) {
            return ledger.dispatch(caller, input);
        }
        Err(MetamorphicError::NotAlive { address: to })
    }

    /// Destroys the contract at `address` and sends its native balance to `beneficiary`.
    ///
    /// Ledger balances held by `address` are untouched. Returns the refunded amount.
    pub(crate) fn self_destruct(&mut self, address: Address, beneficiary: Address) -> Result<U256> {
        if self.instances.remove(&address).is_none() {
            return Err(MetamorphicError::NotAlive { address });
        }
        let refunded = self.accounts.remove(&address).map(|account| account.balance);
        let refunded = refunded.unwrap_or_default();
        // Sending to itself burns the balance.
        if beneficiary != address {
            let account = self.accounts.entry(beneficiary).or_default();
            account.balance =
                account.balance.checked_add(refunded).ok_or(MetamorphicError::ArithmeticOverflow)?;
        }
        if let Some(slot) = self.registry.lookup_by_address(&address) {
            self.registry.set_alive(slot.salt, false)?;
        }

        self.traces.push(StateTrace::SelfDestruct(SelfDestructTrace {
            address,
            beneficiary,
            refunded,
            block: self.block,
        }));
        info!(%address, %beneficiary, %refunded, "Self-destructed");
        Ok(refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, bytes};

    use crate::{InertContract, MetamorphicError};

    const CREATOR: Address = address!("0x0000000000000000000000000000000000000c0c");
    const CONTRACT: Address = address!("0x00000000000000000000000000000000000000cc");
    const HEIR: Address = address!("0x0000000000000000000000000000000000000e1e");

    fn world_with_contract() -> World {
        let mut world = World::default();
        let code = bytes!("33ff");
        world.create_account(CREATOR, CONTRACT, code.clone(), code, None);
        world.install(CONTRACT, Box::new(InertContract));
        world
    }

    #[test]
    fn test_create_account_records_code_and_trace() {
        let world = world_with_contract();
        assert!(world.has_code(&CONTRACT));
        assert_eq!(world.code(&CONTRACT), Some(bytes!("33ff")));
        assert_eq!(world.nonce(&CREATOR), 1);
        assert_eq!(world.nonce(&CONTRACT), 1);
        let trace = world.create_traces(&CONTRACT).next().unwrap();
        assert_eq!(trace.creator, CREATOR);
        assert_eq!(trace.code_hash, world.code_hash(&CONTRACT));
    }

    #[test]
    fn test_self_destruct_forwards_balance_and_removes_account() {
        let mut world = world_with_contract();
        world.fund(CONTRACT, U256::from(42)).unwrap();

        assert_eq!(world.self_destruct(CONTRACT, HEIR).unwrap(), U256::from(42));
        assert_eq!(world.native_balance(&HEIR), U256::from(42));
        assert_eq!(world.native_balance(&CONTRACT), U256::ZERO);
        assert!(!world.has_code(&CONTRACT));
        assert_eq!(world.code(&CONTRACT), None);
        assert_eq!(world.nonce(&CONTRACT), 0);
        assert!(!world.is_installed(&CONTRACT));
        assert!(matches!(world.traces().last(), Some(StateTrace::SelfDestruct(_))));
    }

    #[test]
    fn test_self_destruct_to_itself_burns_balance() {
        let mut world = world_with_contract();
        world.fund(CONTRACT, U256::from(7)).unwrap();
        world.self_destruct(CONTRACT, CONTRACT).unwrap();
        assert_eq!(world.native_balance(&CONTRACT), U256::ZERO);
    }

    #[test]
    fn test_call_to_empty_address_is_not_alive() {
        let mut world = World::default();
        let err = world.call(HEIR, HEIR, CONTRACT, &[]).unwrap_err();
        assert!(matches!(err, MetamorphicError::NotAlive { address } if address == CONTRACT));
    }

    #[test]
    fn test_transact_restores_state_on_error() {
        let mut world = world_with_contract();
        let before = world.traces().len();
        let result: Result<()> = world.transact(|world| {
            world.fund(HEIR, U256::from(1))?;
            world.self_destruct(CONTRACT, HEIR)?;
            Err(MetamorphicError::ZeroAmount)
        });
        assert!(matches!(result, Err(MetamorphicError::ZeroAmount)));
        assert_eq!(world.native_balance(&HEIR), U256::ZERO);
        assert!(world.is_installed(&CONTRACT));
        assert_eq!(world.traces().len(), before);
    }

    #[test]
    fn test_transact_keeps_earlier_traces() {
        let mut world = world_with_contract();
        world
            .transact(|world| {
                world.create_account(CREATOR, HEIR, Bytes::new(), bytes!("00"), None);
                Ok(())
            })
            .unwrap();
        let committed = world.traces().to_vec();
        assert_eq!(committed.len(), 2);

        let result: Result<()> = world.transact(|world| {
            world.self_destruct(CONTRACT, HEIR)?;
            assert_eq!(world.traces().len(), 3);
            Err(MetamorphicError::ZeroAmount)
        });
        assert!(result.is_err());
        assert_eq!(world.traces(), committed.as_slice());
        assert!(world.has_code(&HEIR));
        assert!(world.is_installed(&CONTRACT));
    }

    #[test]
    fn test_mine_and_advance_time() {
        let mut world = World::new(BlockEnv { number: 1, timestamp: 100 });
        assert_eq!(world.mine(12), BlockEnv { number: 2, timestamp: 112 });
        world.advance_time(8);
        assert_eq!(world.block(), BlockEnv { number: 2, timestamp: 120 });

        world.advance_time(u64::MAX);
        assert_eq!(world.block().timestamp, u64::MAX);
        assert_eq!(world.mine(12), BlockEnv { number: 3, timestamp: u64::MAX });
    }
}
