use std::time::Duration;

use cadre_state::Genesis;
use cadre_types::Params;
use serde::{Deserialize, Serialize};

use crate::keys::dev_genesis;

/// Configuration for a single-node development chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnetConfig {
    /// Time between two blocks.
    pub block_interval: Duration,
    /// Number of recent blocks whose transaction results can still be looked up.
    pub retain_results: u64,
    /// Blocks between the end of the block that changes the validator set and the block from
    /// which the consensus layer runs with the change.
    pub validator_update_delay: u64,
    pub genesis: Genesis,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            block_interval: Duration::from_secs(1),
            retain_results: 128,
            validator_update_delay: 2,
            genesis: dev_genesis("cadre-devnet", Params::default(), 4),
        }
    }
}
