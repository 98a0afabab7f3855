//! Query a consensus node's validator set.

use cadre_client::{ConsensusClient, Url};
use clap::Parser;

use super::Run;

#[derive(Parser)]
pub struct Validators {
    /// Base URL of the consensus node's HTTP endpoint.
    #[arg(long, default_value = "http://127.0.0.1:26657/")]
    pub url: Url,
}

impl Run for Validators {
    async fn run(self) -> color_eyre::Result<()> {
        let validators = ConsensusClient::new(self.url).validators().await?;
        println!("{}", serde_json::to_string_pretty(&validators)?);
        Ok(())
    }
}
