//! Talking to a cadre node: submitting staking requests and waiting until they land.

#[macro_use]
extern crate tracing;

pub mod poller;
pub use poller::{BatchError, Confirmation, PollConfig, PollError, PollHandle, Poller, Timeouts};

mod rpc;
pub use rpc::{Rpc, RpcError};

mod staking;
pub use staking::{ExecuteError, StakeClient};

mod consensus;
pub use consensus::ConsensusClient;

pub use reqwest::Url;

#[cfg(test)]
mod mock;
