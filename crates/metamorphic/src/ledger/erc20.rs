use alloy_primitives::{map::HashMap, Address, Bytes, U256};
use alloy_sol_types::SolValue;
use metamorphic_contracts::erc20::IERC20::IERC20Calls;
use tracing::trace;

use super::{ExternalLedger, LedgerError};
use crate::{constants, decode_calldata, MetamorphicError};

/// An in-memory ERC-20 ledger.
///
/// An allowance of `U256::MAX` is treated as infinite and never decreases.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Erc20Ledger {
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, HashMap<Address, U256>>,
}

impl Erc20Ledger {
    /// Creates an empty ledger.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: constants::erc20::DECIMALS,
            ..Default::default()
        }
    }

    /// The token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The token decimals.
    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Executes ABI-encoded `IERC20` calldata sent by `caller` and returns the ABI-encoded output.
    pub fn dispatch(&mut self, caller: Address, input: &[u8]) -> Result<Bytes, MetamorphicError> {
        let output = match decode_calldata::<IERC20Calls>(input)? {
            IERC20Calls::totalSupply(_) => self.total_supply().abi_encode(),
            IERC20Calls::balanceOf(call) => self.balance_of(call.account).abi_encode(),
            IERC20Calls::allowance(call) => self.allowance(call.owner, call.spender).abi_encode(),
            IERC20Calls::approve(call) => {
                self.approve(caller, call.spender, call.amount)?.abi_encode()
            }
            IERC20Calls::transfer(call) => {
                self.transfer(caller, call.to, call.amount)?.abi_encode()
            }
            IERC20Calls::transferFrom(call) => {
                self.transfer_from(caller, call.from, call.to, call.amount)?.abi_encode()
            }
            IERC20Calls::mint(call) => {
                self.mint(call.to, call.amount)?;
                Vec::new()
            }
        };
        Ok(output.into())
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance { owner: from, balance, needed: amount });
        }
        self.balances.insert(from, balance - amount);
        // `to` cannot overflow: the sum of all balances is bounded by the total supply.
        *self.balances.entry(to).or_default() += amount;
        trace!(symbol = %self.symbol, %from, %to, %amount, "Moved tokens");
        Ok(())
    }
}

impl ExternalLedger for Erc20Ledger {
    fn mint(&mut self, to: Address, amount: U256) -> Result<(), LedgerError> {
        self.total_supply =
            self.total_supply.checked_add(amount).ok_or(LedgerError::SupplyOverflow { amount })?;
        *self.balances.entry(to).or_default() += amount;
        trace!(symbol = %self.symbol, %to, %amount, "Minted tokens");
        Ok(())
    }

    fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&owner)
            .and_then(|spenders| spenders.get(&spender))
            .copied()
            .unwrap_or_default()
    }

    fn total_supply(&self) -> U256 {
        self.total_supply
    }

    fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<bool, LedgerError> {
        self.allowances.entry(owner).or_default().insert(spender, amount);
        trace!(symbol = %self.symbol, %owner, %spender, %amount, "Approved spender");
        Ok(true)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<bool, LedgerError> {
        self.move_balance(from, to, amount)?;
        Ok(true)
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, LedgerError> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: from,
                spender,
                allowance,
                needed: amount,
            });
        }
        self.move_balance(from, to, amount)?;
        if allowance != U256::MAX {
            self.allowances.entry(from).or_default().insert(spender, allowance - amount);
        }
        Ok(true)
    }
}
