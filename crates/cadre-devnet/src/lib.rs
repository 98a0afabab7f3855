//! An in-process, single-node cadre chain.
//!
//! The devnet runs the staking state machine behind the [`cadre_client::Rpc`] interface, with a
//! mempool, a block producer on a timer and a consensus validator set that lags the state by a
//! configurable number of blocks. It does not sign or gossip anything.

#[macro_use]
extern crate tracing;

mod config;
pub use config::DevnetConfig;

mod consensus;

mod keys;
pub use keys::{DEV_BALANCE, GENESIS_SEED, dev_address, dev_genesis, dev_key};

mod node;
pub use node::Devnet;

pub mod server;

mod fixture;
pub use fixture::{Fixture, FixtureConfig, MIN_VALIDATORS};
