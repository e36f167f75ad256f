//! Static bytecode scans.

use revm::bytecode::opcode::{
    CREATE2, DELEGATECALL, INVALID, JUMPDEST, PUSH1, PUSH32, RETURN, REVERT, SELFDESTRUCT, STOP,
};

/// Whether `opcode` ends execution.
#[inline]
pub const fn is_halting(opcode: u8) -> bool {
    matches!(opcode, STOP | RETURN | REVERT | INVALID | SELFDESTRUCT)
}

/// Whether `opcode` is one of PUSH1..=PUSH32.
#[inline]
pub const fn is_push(opcode: u8) -> bool {
    opcode >= PUSH1 && opcode <= PUSH32
}

/// Whether `code` contains a reachable `opcode`.
///
/// PUSH immediates are skipped. Bytes following a halting opcode are unreachable until the next
/// JUMPDEST and are ignored.
pub fn contains_opcode(code: &[u8], opcode: u8) -> bool {
    let mut halted = false;
    let mut pc = 0;
    while let Some(&op) = code.get(pc) {
        if op == opcode && !halted {
            return true;
        }
        if op == JUMPDEST {
            halted = false;
        } else if is_halting(op) {
            halted = true;
        } else if is_push(op) {
            pc += (op - PUSH1) as usize + 1;
        }
        pc += 1;
    }
    false
}

/// Whether `code` contains a reachable SELFDESTRUCT.
pub fn contains_selfdestruct(code: &[u8]) -> bool {
    contains_opcode(code, SELFDESTRUCT)
}

/// Whether `code` contains a reachable CREATE2.
pub fn contains_create2(code: &[u8]) -> bool {
    contains_opcode(code, CREATE2)
}

/// Whether `code` contains a reachable DELEGATECALL.
pub fn contains_delegatecall(code: &[u8]) -> bool {
    contains_opcode(code, DELEGATECALL)
}
