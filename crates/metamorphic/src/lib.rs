//! A model of metamorphic contracts: a CREATE2 slot whose code can be self-destructed and
//! replaced while address-keyed token ledgers keep crediting whatever code lives there.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use alloy_primitives;
pub use alloy_sol_types;
pub use metamorphic_contracts as contracts;
pub use revm;

pub mod constants;

mod config;
pub use config::*;

mod contract;
pub use contract::*;

mod derive;
pub use derive::*;

pub mod detect;

mod error;
pub use error::*;

mod factory;
pub use factory::*;

mod ledger;
pub use ledger::*;

pub mod logging;

mod registry;
pub use registry::*;

mod state;
pub use state::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod types;
pub use types::*;
