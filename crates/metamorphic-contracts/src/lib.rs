//! ABI interfaces and bytecode artifacts for the metamorphic factory model.
//!
//! Each module pairs a `sol!` interface with the runtime bytecode that identifies the contract.
//! The bytecode is never interpreted: it provides the code hash that selects the installed logic
//! and the opcodes the metamorphic detector scans.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]
#![deny(unused_must_use)]

pub use alloy_primitives;

/// The fixed initialization code every metamorphic deployment is created with.
///
/// When executed, it asks its creator for the current implementation and copies that runtime code
/// into place. Since it never changes, the CREATE2 address only depends on the factory and salt.
pub mod metamorphic_init {
    use alloy_primitives::{bytes, Bytes};

    /// The metamorphic initialization code.
    pub const CODE: Bytes = bytes!("5860208158601c335a63aaf10f428752fa158151803b80938091923cf3");
}

/// The metamorphic factory contract.
pub mod factory {
    use alloy_primitives::{bytes, Bytes};
    use alloy_sol_types::sol;

    /// Runtime code of the factory: `PUSH18 "MetamorphicFactory" POP PUSH0 PUSH0 PUSH0 PUSH0
    /// CREATE2 POP STOP`.
    pub const CODE: Bytes =
        bytes!("714d6574616d6f7270686963466163746f7279505f5f5f5ff55000");

    sol! {
        /// External surface of the metamorphic factory.
        #[sol(all_derives)]
        interface IMetamorphicFactory {
            /// Computes the address a metamorphic contract will be deployed to for `salt`.
            function getMetamorphicContractAddress(bytes32 salt) external view returns (address);

            /// Deploys `implementationCode` at the metamorphic address for `salt` and runs the
            /// initializer calldata against it.
            function deployMetamorphicContract(
                bytes32 salt,
                bytes calldata implementationCode,
                bytes calldata initializationCalldata
            ) external returns (address);
        }
    }
}

/// The fungible token used as the external ledger.
pub mod erc20 {
    use alloy_primitives::{bytes, Bytes};
    use alloy_sol_types::sol;

    /// Runtime code of the token: `PUSH5 "ERC20" POP PUSH0 PUSH0 RETURN`.
    pub const CODE: Bytes = bytes!("644552433230505f5ff3");

    sol! {
        /// A mintable ERC-20 token.
        #[sol(all_derives)]
        interface IERC20 {
            function totalSupply() external view returns (uint256);
            function balanceOf(address account) external view returns (uint256);
            function allowance(address owner, address spender) external view returns (uint256);
            function approve(address spender, uint256 amount) external returns (bool);
            function transfer(address to, uint256 amount) external returns (bool);
            function transferFrom(address from, address to, uint256 amount) external returns (bool);
            function mint(address to, uint256 amount) external;
        }
    }
}

/// Contracts that can destroy themselves.
pub mod selfdestruct {
    use alloy_sol_types::sol;

    sol! {
        /// Self-destruction entry point shared by every staking variant.
        #[sol(all_derives)]
        interface ISelfDestructible {
            function kill() external;
        }
    }
}

/// The honest staking contract.
pub mod honest_staking {
    use alloy_primitives::{bytes, Bytes};
    use alloy_sol_types::sol;

    /// Runtime code: `PUSH13 "HonestStaking" POP CALLER SELFDESTRUCT`.
    pub const CODE: Bytes = bytes!("6c486f6e6573745374616b696e675033ff");

    sol! {
        /// A staking pool paying `rewardsToken` over time for deposits of `stakingToken`.
        #[sol(all_derives)]
        interface IHonestStaking {
            function setStakingAndRewardTokens(address stakingToken, address rewardsToken) external;
            function stakingToken() external view returns (address);
            function rewardsToken() external view returns (address);
            function owner() external view returns (address);
            function totalSupply() external view returns (uint256);
            function balanceOf(address account) external view returns (uint256);
            function rewardPerToken() external view returns (uint256);
            function earned(address account) external view returns (uint256);
            function stake(uint256 amount) external;
            function withdraw(uint256 amount) external;
            function getReward() external;
            function kill() external;
        }
    }
}

/// The adversarial staking contract, ABI-compatible with the honest initializer.
pub mod evil_staking {
    use alloy_primitives::{bytes, Bytes};
    use alloy_sol_types::sol;

    /// Runtime code: `PUSH11 "EvilStaking" POP CALLER SELFDESTRUCT`.
    pub const CODE: Bytes = bytes!("6a4576696c5374616b696e675033ff");

    sol! {
        /// Same initializer as `IHonestStaking`, but only exposes the address's raw ledger
        /// balance and a way to move it out.
        #[sol(all_derives)]
        interface IEvilStaking {
            function setStakingAndRewardTokens(address stakingToken, address rewardsToken) external;
            function stakingToken() external view returns (address);
            function rewardsToken() external view returns (address);
            function owner() external view returns (address);
            function checkStakedBalance() external view returns (uint256);
            function stealTokens(address destination) external;
            function kill() external;
        }
    }
}
