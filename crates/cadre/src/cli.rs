//! CLI command definitions for cadre.

use clap::Parser;
use std::future::Future;

mod devnet;
mod scenario;
mod validators;

/// Run and exercise a cadre validator registry.
#[derive(Parser)]
#[command(name = "cadre")]
pub enum Options {
    /// Run a single-node devnet until interrupted.
    Devnet(devnet::Devnet),
    /// Run the validator lifecycle scenario against a fresh devnet.
    Scenario(scenario::Scenario),
    /// Print the validator set served by a consensus node.
    Validators(validators::Validators),
}

pub trait Run {
    fn run(self) -> impl Future<Output = color_eyre::Result<()>> + Send;
}

impl Run for Options {
    async fn run(self) -> color_eyre::Result<()> {
        match self {
            Self::Devnet(cmd) => cmd.run().await,
            Self::Scenario(cmd) => cmd.run().await,
            Self::Validators(cmd) => cmd.run().await,
        }
    }
}
