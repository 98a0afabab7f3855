//! Timing and configuration shared by the integration tests.

use std::time::Duration;

use cadre_client::{PollConfig, Timeouts};
use cadre_devnet::{DevnetConfig, FixtureConfig};

/// Time between two devnet blocks.
pub const BLOCK_INTERVAL: Duration = Duration::from_millis(50);

/// How often the poller samples the chain.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A replacement consensus key, as carried in update requests.
pub const UPDATED_KEY: &str = "LY3sRPcr63CE9uIJivApXlcYXKUoidtD+64mIljrYxk=";

pub fn timeouts() -> Timeouts {
    Timeouts {
        blocks: 10,
        wall: Duration::from_secs(10),
    }
}

pub fn fixture_config() -> FixtureConfig {
    FixtureConfig {
        devnet: DevnetConfig {
            block_interval: BLOCK_INTERVAL,
            ..Default::default()
        },
        poll: PollConfig {
            interval: POLL_INTERVAL,
            timeouts: timeouts(),
        },
        accounts: 6,
    }
}
