//! Deterministic CREATE2 address derivation for metamorphic slots.
//!
//! The address of a slot is `keccak256(0xff ++ factory ++ salt ++ keccak256(init_code))[12:]`.
//! The factory always creates through the same metamorphic init code, so the address only depends
//! on the factory and the salt. It can be announced before the runtime logic is even chosen.

use alloy_primitives::{keccak256, Address, B256};
use metamorphic_contracts::metamorphic_init;
use once_cell::sync::Lazy;

use crate::Salt;

/// The hash of the metamorphic init code.
pub static METAMORPHIC_INIT_CODE_HASH: Lazy<B256> =
    Lazy::new(|| keccak256(&metamorphic_init::CODE));

/// Computes the CREATE2 address for `factory`, `salt` and `init_code_hash`.
///
/// This is equivalent to `factory.create2(salt, init_code_hash)` in alloy.
#[inline]
pub fn derive_address(factory: Address, salt: Salt, init_code_hash: B256) -> Address {
    factory.create2(salt, init_code_hash)
}

/// Derives slot addresses for one factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressDeriver {
    factory: Address,
    init_code_hash: B256,
}

impl AddressDeriver {
    /// Creates a deriver for `factory` using the metamorphic init code.
    pub fn new(factory: Address) -> Self {
        Self::with_init_code_hash(factory, *METAMORPHIC_INIT_CODE_HASH)
    }

    /// Creates a deriver for `factory` using an arbitrary init code hash.
    pub const fn with_init_code_hash(factory: Address, init_code_hash: B256) -> Self {
        Self { factory, init_code_hash }
    }

    /// The factory whose addresses are derived.
    pub const fn factory(&self) -> Address {
        self.factory
    }

    /// The init code hash fed into the derivation.
    pub const fn init_code_hash(&self) -> B256 {
        self.init_code_hash
    }

    /// Derives the address of the slot keyed by `salt`.
    pub fn derive(&self, salt: Salt) -> Address {
        derive_address(self.factory, salt, self.init_code_hash)
    }
}
