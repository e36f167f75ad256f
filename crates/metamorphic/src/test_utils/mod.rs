//! Test utilities for the metamorphic factory.

mod bytecode;
mod scenario;

pub use bytecode::*;
pub use scenario::*;

use alloy_primitives::{Address, U256};

/// Installs a test-writer subscriber. Later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a distinct account address from a small integer.
pub fn account(index: u64) -> Address {
    Address::from_word(U256::from(index).into())
}
