//! The deployment registry, binding each salt to its slot.

use alloy_primitives::{map::HashMap, Address, B256};
use revm::primitives::KECCAK_EMPTY;
use serde::{Deserialize, Serialize};

use crate::Salt;

/// Errors raised by the [`DeploymentRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The salt has no slot.
    #[error("Salt {0} is not registered")]
    UnknownSalt(Salt),
    /// The salt is already bound to a different address.
    #[error("Salt {salt} is bound to {bound}, refusing to rebind it to {requested}")]
    AddressRebind {
        /// The salt of the slot.
        salt: Salt,
        /// The address the slot is bound to.
        bound: Address,
        /// The address that was requested.
        requested: Address,
    },
}

/// The binding between a salt and its address across deploy/destroy cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSlot {
    /// The salt keying this slot.
    pub salt: Salt,
    /// The derived address. Never changes once registered.
    pub address: Address,
    /// Whether code is currently installed at `address`.
    pub is_alive: bool,
    /// Hash of the installed runtime code, or of the last installed code when dead.
    pub code_hash: B256,
    /// Timestamp of the block the current (or last) incarnation was deployed in.
    pub init_timestamp: u64,
    /// Number of times the slot has been brought alive.
    pub incarnation: u64,
}

impl DeploymentSlot {
    const fn new(salt: Salt, address: Address) -> Self {
        Self {
            salt,
            address,
            is_alive: false,
            code_hash: KECCAK_EMPTY,
            init_timestamp: 0,
            incarnation: 0,
        }
    }
}

/// Map from salt to deployment slot, with a reverse index by address.
///
/// Slots are never removed: once a salt is registered its address binding is permanent.
#[derive(Clone, Debug, Default)]
pub struct DeploymentRegistry {
    slots: HashMap<Salt, DeploymentSlot>,
    by_address: HashMap<Address, Salt>,
}

impl DeploymentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `salt` at `address`, creating a dead slot if the salt is new.
    ///
    /// Registering a salt again with the same address is a no-op. A different address is rejected
    /// since the address is write-once.
    pub fn register(&mut self, salt: Salt, address: Address) -> Result<(), RegistryError> {
        if let Some(slot) = self.slots.get(&salt) {
            if slot.address != address {
                return Err(RegistryError::AddressRebind {
                    salt,
                    bound: slot.address,
                    requested: address,
                });
            }
            return Ok(());
        }
        self.slots.insert(salt, DeploymentSlot::new(salt, address));
        self.by_address.insert(address, salt);
        Ok(())
    }

    /// Returns the slot of `salt`.
    pub fn lookup(&self, salt: &Salt) -> Option<DeploymentSlot> {
        self.slots.get(salt).copied()
    }

    /// Returns the slot bound to `address`.
    pub fn lookup_by_address(&self, address: &Address) -> Option<DeploymentSlot> {
        self.by_address.get(address).and_then(|salt| self.lookup(salt))
    }

    /// Sets the liveness of `salt`. Bringing a dead slot alive starts a new incarnation.
    pub fn set_alive(&mut self, salt: Salt, alive: bool) -> Result<(), RegistryError> {
        let slot = self.slot_mut(salt)?;
        if alive && !slot.is_alive {
            slot.incarnation += 1;
        }
        slot.is_alive = alive;
        Ok(())
    }

    /// Sets the installed code hash of `salt`.
    pub fn set_code_hash(&mut self, salt: Salt, code_hash: B256) -> Result<(), RegistryError> {
        self.slot_mut(salt)?.code_hash = code_hash;
        Ok(())
    }

    /// Records a fresh deployment at `salt`: new code hash, deployment time and liveness.
    pub fn activate(
        &mut self,
        salt: Salt,
        code_hash: B256,
        timestamp: u64,
    ) -> Result<DeploymentSlot, RegistryError> {
        self.set_code_hash(salt, code_hash)?;
        self.slot_mut(salt)?.init_timestamp = timestamp;
        self.set_alive(salt, true)?;
        Ok(self.slots[&salt])
    }

    /// Iterates over all slots in arbitrary order.
    pub fn slots(&self) -> impl Iterator<Item = &DeploymentSlot> {
        self.slots.values()
    }

    /// Number of registered slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_mut(&mut self, salt: Salt) -> Result<&mut DeploymentSlot, RegistryError> {
        self.slots.get_mut(&salt).ok_or(RegistryError::UnknownSalt(salt))
    }
}
