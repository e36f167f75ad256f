//! External token ledgers, keyed purely by address.
//!
//! A ledger never looks at the code living at an address. Balances recorded against a contract
//! survive its self-destruction and are visible to whatever code is installed there next.

use core::fmt::Debug;

use alloy_primitives::{map::HashMap, Address, U256};
use auto_impl::auto_impl;

mod erc20;
pub use erc20::*;

/// Errors raised by token ledgers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The spender's allowance does not cover the transfer.
    #[error("Insufficient allowance: {spender} may move {allowance} of {owner}, needs {needed}")]
    InsufficientAllowance {
        /// The account whose tokens are moved.
        owner: Address,
        /// The account moving them.
        spender: Address,
        /// The current allowance.
        allowance: U256,
        /// The amount requested.
        needed: U256,
    },
    /// The owner's balance does not cover the transfer.
    #[error("Insufficient balance: {owner} holds {balance}, needs {needed}")]
    InsufficientBalance {
        /// The account whose tokens are moved.
        owner: Address,
        /// The current balance.
        balance: U256,
        /// The amount requested.
        needed: U256,
    },
    /// Minting would overflow the total supply.
    #[error("Minting {amount} overflows the total supply")]
    SupplyOverflow {
        /// The amount that was minted.
        amount: U256,
    },
}

/// A fungible balance store.
///
/// The caller of every state-changing method is explicit, since a ledger is driven both by
/// externally owned accounts and by contracts acting under their own address.
#[auto_impl(&mut, Box)]
pub trait ExternalLedger: Debug {
    /// Creates `amount` new tokens owned by `to`.
    fn mint(&mut self, to: Address, amount: U256) -> Result<(), LedgerError>;

    /// Returns the balance held by `owner`.
    fn balance_of(&self, owner: Address) -> U256;

    /// Returns how many of `owner`'s tokens `spender` may move.
    fn allowance(&self, owner: Address, spender: Address) -> U256;

    /// Returns the total amount of tokens in existence.
    fn total_supply(&self) -> U256;

    /// Lets `spender` move up to `amount` of `owner`'s tokens.
    fn approve(&mut self, owner: Address, spender: Address, amount: U256)
        -> Result<bool, LedgerError>;

    /// Moves `amount` from `from` to `to` on `from`'s own behalf.
    fn transfer(&mut self, from: Address, to: Address, amount: U256)
        -> Result<bool, LedgerError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, LedgerError>;
}

/// Resolves token addresses to their ledgers.
#[auto_impl(&mut, Box)]
pub trait LedgerHost: Debug {
    /// Returns the ledger deployed at `token`.
    fn ledger(&self, token: Address) -> Option<&dyn ExternalLedger>;

    /// Returns the ledger deployed at `token` for mutation.
    fn ledger_mut(&mut self, token: Address) -> Option<&mut dyn ExternalLedger>;
}

/// All token ledgers of a world, keyed by token address.
#[derive(Clone, Debug, Default, derive_more::Deref, derive_more::DerefMut)]
pub struct TokenLedgers(HashMap<Address, Erc20Ledger>);

impl TokenLedgers {
    /// Creates an empty set of ledgers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerHost for TokenLedgers {
    fn ledger(&self, token: Address) -> Option<&dyn ExternalLedger> {
        self.0.get(&token).map(|ledger| ledger as &dyn ExternalLedger)
    }

    fn ledger_mut(&mut self, token: Address) -> Option<&mut dyn ExternalLedger> {
        self.0.get_mut(&token).map(|ledger| ledger as &mut dyn ExternalLedger)
    }
}
