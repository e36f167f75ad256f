use alloy_primitives::{Address, Selector, U256};

use crate::{LedgerError, RegistryError, Salt};

/// Errors surfaced by the metamorphic factory and the contracts it installs.
///
/// Every error aborts the enclosing operation and the world state is rolled back to where it was
/// before the operation started.
#[derive(Debug, thiserror::Error)]
pub enum MetamorphicError {
    /// A deployment was attempted on a slot whose contract is still alive.
    #[error("Slot {salt} is occupied by a live contract at {address}")]
    SlotOccupied {
        /// The salt of the slot.
        salt: Salt,
        /// The address of the live contract.
        address: Address,
    },

    /// The target address has no live code (never deployed, or self-destructed).
    #[error("No live contract at {address}")]
    NotAlive {
        /// The address that was called.
        address: Address,
    },

    /// `kill()` returned without the contract requesting its own destruction.
    #[error("Contract at {address} survived kill")]
    NotDestroyed {
        /// The address that was sent `kill()`.
        address: Address,
    },

    /// A redeployment was requested for a salt that was never deployed.
    #[error("Slot {salt} has never been deployed")]
    UnregisteredSlot {
        /// The salt of the slot.
        salt: Salt,
    },

    /// The freshly derived address does not match the address bound to the slot.
    #[error("Derived address {actual} does not match slot address {expected}")]
    AddressMismatch {
        /// Address bound to the slot.
        expected: Address,
        /// Address derived for this deployment.
        actual: Address,
    },

    /// The one-shot initializer was invoked a second time.
    #[error("Contract is already initialized")]
    AlreadyInitialized,

    /// A function requiring the initializer was invoked before it.
    #[error("Contract is not initialized")]
    NotInitialized,

    /// A privileged function was invoked by someone other than the owner.
    #[error("Caller {caller} is not authorized")]
    Unauthorized {
        /// The caller that was rejected.
        caller: Address,
    },

    /// Stake or withdraw was called with a zero amount.
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// A withdrawal exceeds the caller's stake.
    #[error("Insufficient stake: {staked} staked, {requested} requested")]
    InsufficientStake {
        /// The amount currently staked.
        staked: U256,
        /// The amount requested.
        requested: U256,
    },

    /// A contract referenced a token address that has no ledger.
    #[error("No token ledger at {0}")]
    UnknownToken(Address),

    /// The calldata selector is not part of the installed contract's interface.
    #[error("Unknown function selector {0}")]
    UnknownSelector(Selector),

    /// The calldata is too short to carry a selector.
    #[error("Calldata of {0} bytes is shorter than a selector")]
    ShortCalldata(usize),

    /// ABI decoding of calldata or return data failed.
    #[error("ABI decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    /// A token ledger reported a failed transfer.
    #[error("Token transfer returned false")]
    TransferFailed,

    /// Reward arithmetic overflowed.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Token ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Deployment registry error.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type of the metamorphic factory.
pub type Result<T, E = MetamorphicError> = core::result::Result<T, E>;
