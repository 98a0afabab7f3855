//! End-to-end tests against an in-process devnet.
//!
//! Every test runs inside [`cadre_devnet::Fixture::scoped`]: a fresh single-node chain with one
//! genesis validator, a pool of funded accounts and three throwaway validators declared from the
//! pool, so that four candidates exist before the scenario starts. Blocks are produced every
//! [`constants::BLOCK_INTERVAL`], and validator set changes reach the consensus layer two blocks
//! after the block that made them.
//!
//! # Module Organization
//!
//! - `constants`: block timing, poll budgets and fixture configuration
//! - `lifecycle_tests`: the validator lifecycle from declaration to withdrawal
//! - `poller_tests`: confirmation waits against a live and a halted chain
//! - `server_tests`: the HTTP validator set endpoint
//! - `fixture_tests`: setup and teardown guarantees of the scoped fixture

pub mod constants;

mod fixture_tests;
mod lifecycle_tests;
mod poller_tests;
mod server_tests;
