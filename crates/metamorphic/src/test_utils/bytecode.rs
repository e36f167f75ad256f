//! Hand-assembled bytecode for detector tests.

use alloy_primitives::{Address, Bytes};
use revm::bytecode::opcode::{
    CALLER, CREATE2, DELEGATECALL, GAS, JUMPDEST, PUSH0, RETURN, SELFDESTRUCT, STOP,
};

/// Assembles runtime code one instruction at a time.
#[derive(Debug, Default)]
pub struct BytecodeBuilder {
    code: Vec<u8>,
}

impl BytecodeBuilder {
    /// The assembled code.
    pub fn build(self) -> Bytes {
        self.code.into()
    }

    fn ops<const N: usize>(mut self, ops: [u8; N]) -> Self {
        self.code.extend(ops);
        self
    }

    /// `PUSH<n>` with `immediate` as its data, `n` being the immediate length.
    pub fn push(mut self, immediate: &[u8]) -> Self {
        assert!(immediate.len() <= 32, "immediate of {} bytes", immediate.len());
        self.code.push(PUSH0 + immediate.len() as u8);
        self.code.extend_from_slice(immediate);
        self
    }

    /// `CALLER SELFDESTRUCT`.
    pub fn selfdestruct_to_caller(self) -> Self {
        self.ops([CALLER, SELFDESTRUCT])
    }

    /// A `DELEGATECALL` of `target` with no calldata, forwarding all gas.
    pub fn delegatecall(self, target: Address) -> Self {
        self.ops([PUSH0; 4]).push(target.as_slice()).ops([GAS, DELEGATECALL])
    }

    /// A `CREATE2` of empty init code, zero salt and zero value.
    pub fn create2(self) -> Self {
        self.ops([PUSH0, PUSH0, PUSH0, PUSH0, CREATE2])
    }

    /// `STOP`.
    pub fn stop(self) -> Self {
        self.ops([STOP])
    }

    /// `JUMPDEST`.
    pub fn jumpdest(self) -> Self {
        self.ops([JUMPDEST])
    }

    /// `RETURN` of no data.
    pub fn return_empty(self) -> Self {
        self.ops([PUSH0, PUSH0, RETURN])
    }
}
