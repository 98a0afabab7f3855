//! Run a devnet in the foreground.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cadre_devnet::{DevnetConfig, server};
use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use super::Run;

/// Run a single-node devnet and serve its validator set over HTTP.
#[derive(Parser)]
pub struct Devnet {
    /// Address to serve the HTTP endpoints on.
    #[arg(long, default_value = "127.0.0.1:26657")]
    pub bind: SocketAddr,

    /// JSON devnet configuration. Flags given alongside it take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Milliseconds between blocks.
    #[arg(long, env = "CADRE_BLOCK_INTERVAL_MS")]
    pub block_interval_ms: Option<u64>,

    /// Blocks before a validator set change reaches the consensus layer.
    #[arg(long)]
    pub validator_update_delay: Option<u64>,
}

impl Devnet {
    async fn load_config(&self) -> Result<DevnetConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let contents = tokio::fs::read(path)
                    .await
                    .wrap_err_with(|| format!("failed to read {}", path.display()))?;
                serde_json::from_slice(&contents)
                    .wrap_err_with(|| format!("invalid devnet configuration in {}", path.display()))?
            }
            None => DevnetConfig::default(),
        };
        if let Some(ms) = self.block_interval_ms {
            config.block_interval = Duration::from_millis(ms);
        }
        if let Some(delay) = self.validator_update_delay {
            config.validator_update_delay = delay;
        }
        Ok(config)
    }
}

impl Run for Devnet {
    async fn run(self) -> Result<()> {
        let config = self.load_config().await?;
        let devnet = Arc::new(cadre_devnet::Devnet::start(config).await?);

        let listener = TcpListener::bind(self.bind)
            .await
            .wrap_err_with(|| format!("failed to bind {}", self.bind))?;
        let server = tokio::spawn(server::serve(listener, devnet.clone()));

        tokio::select! {
            served = server => served??,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupted; shutting down");
            }
        }
        devnet.shutdown();
        Ok(())
    }
}
