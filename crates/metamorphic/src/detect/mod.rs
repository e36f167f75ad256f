//! Metamorphic contract detection.
//!
//! A contract is flagged from its creation trace and the current state of the world: whether its
//! code hash moved since the first deployment, whether it was created through the metamorphic init
//! code, which dangerous opcodes its first runtime code holds, and what kind of account created
//! it.

use alloy_primitives::{Address, B256};
use bitflags::bitflags;
use metamorphic_contracts::metamorphic_init;
use serde::{Deserialize, Serialize};

use crate::World;

mod opcodes;
pub use opcodes::*;

bitflags! {
    /// Signals that a contract can change its code in place.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MetamorphicIndicators: u8 {
        /// The current code hash differs from the one of the first deployment.
        const CODE_HASH_CHANGED = 1 << 0;
        /// The contract was created with the metamorphic init code.
        const METAMORPHIC_INIT_CODE = 1 << 1;
        /// The first deployed runtime code can self-destruct.
        const SELFDESTRUCT = 1 << 2;
        /// The first deployed runtime code can delegate-call.
        const DELEGATECALL = 1 << 3;
        /// The creator is a contract.
        const DEPLOYED_BY_CONTRACT = 1 << 4;
        /// The creator's code can CREATE2.
        const DEPLOYER_CREATE2 = 1 << 5;
    }
}

/// The detector's verdict on one address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAnalysis {
    /// The analyzed address.
    pub address: Address,
    /// The creator from the first creation trace.
    pub deployer: Option<Address>,
    /// Code hash of the first deployment.
    pub deployed_code_hash: Option<B256>,
    /// Current code hash.
    pub current_code_hash: B256,
    /// Raised indicators.
    pub indicators: MetamorphicIndicators,
}

impl ContractAnalysis {
    /// Whether the contract is metamorphic: its code changed, or it was created through the
    /// metamorphic init code.
    pub const fn is_metamorphic(&self) -> bool {
        self.indicators.intersects(
            MetamorphicIndicators::CODE_HASH_CHANGED
                .union(MetamorphicIndicators::METAMORPHIC_INIT_CODE),
        )
    }
}

/// Whether `init_code` embeds the metamorphic init code.
pub fn contains_metamorphic_init_code(init_code: &[u8]) -> bool {
    let code = metamorphic_init::CODE;
    let needle = code.as_ref();
    init_code.windows(needle.len()).any(|window| window == needle)
}

/// Analyzes the contract at `address`. An address that was never created raises no indicator.
pub fn analyze_contract(world: &World, address: Address) -> ContractAnalysis {
    let current_code_hash = world.code_hash(&address);
    let Some(create) = world.create_traces(&address).next() else {
        return ContractAnalysis {
            address,
            deployer: None,
            deployed_code_hash: None,
            current_code_hash,
            indicators: MetamorphicIndicators::empty(),
        };
    };

    let deployer_code = world.code(&create.creator).unwrap_or_default();
    let mut indicators = MetamorphicIndicators::empty();
    indicators.set(MetamorphicIndicators::CODE_HASH_CHANGED, create.code_hash != current_code_hash);
    indicators.set(
        MetamorphicIndicators::METAMORPHIC_INIT_CODE,
        contains_metamorphic_init_code(&create.init_code),
    );
    indicators.set(MetamorphicIndicators::SELFDESTRUCT, contains_selfdestruct(&create.runtime_code));
    indicators
        .set(MetamorphicIndicators::DELEGATECALL, contains_delegatecall(&create.runtime_code));
    indicators.set(MetamorphicIndicators::DEPLOYED_BY_CONTRACT, !deployer_code.is_empty());
    indicators.set(MetamorphicIndicators::DEPLOYER_CREATE2, contains_create2(&deployer_code));

    ContractAnalysis {
        address,
        deployer: Some(create.creator),
        deployed_code_hash: Some(create.code_hash),
        current_code_hash,
        indicators,
    }
}
