//! The validator lifecycle scenario, run against a fresh devnet.

use std::sync::Arc;
use std::time::Duration;

use cadre_client::{BatchError, ExecuteError, PollConfig, PollError, Timeouts};
use cadre_devnet::{DevnetConfig, Fixture, FixtureConfig};
use cadre_types::key::encode_pub_key;
use cadre_types::response::TxResult;
use cadre_types::validator::{Description, Flag, ValidatorState};
use clap::Parser;
use color_eyre::eyre::{OptionExt, Report, Result, ensure};
use tracing::{error, info};

use super::Run;

/// Exit code for a chain that stopped making progress, as opposed to a failed check.
const EXIT_STALLED: i32 = 2;

const NEW_KEY: &str = "LY3sRPcr63CE9uIJivApXlcYXKUoidtD+64mIljrYxk=";

/// Declare, verify, deactivate, activate, update, move and withdraw a validator, checking the
/// chain's answer after every step.
#[derive(Parser)]
pub struct Scenario {
    /// Blocks a wait may span before it fails.
    #[arg(long, default_value = "10")]
    pub block_timeout: u64,

    /// Seconds after which a wait gives the chain up as stalled.
    #[arg(long, default_value = "60")]
    pub wait_timeout: u64,

    /// Milliseconds between two polls of the chain.
    #[arg(long, default_value = "100")]
    pub interval_ms: u64,

    /// Milliseconds between devnet blocks.
    #[arg(long, default_value = "200")]
    pub block_interval_ms: u64,
}

impl Run for Scenario {
    async fn run(self) -> Result<()> {
        let config = FixtureConfig {
            devnet: DevnetConfig {
                block_interval: Duration::from_millis(self.block_interval_ms),
                ..Default::default()
            },
            poll: PollConfig {
                interval: Duration::from_millis(self.interval_ms),
                timeouts: Timeouts {
                    blocks: self.block_timeout,
                    wall: Duration::from_secs(self.wait_timeout),
                },
            },
            ..Default::default()
        };

        match Fixture::scoped(config, lifecycle).await {
            Ok(()) => {
                info!("scenario passed");
                Ok(())
            }
            Err(e) if is_fatal(&e) => {
                error!("{e:#}");
                error!("chain is not making progress; aborting");
                std::process::exit(EXIT_STALLED)
            }
            Err(e) => Err(e),
        }
    }
}

/// Whether any error in the chain says the environment is broken.
fn is_fatal(report: &Report) -> bool {
    report.chain().any(|e| {
        e.downcast_ref::<ExecuteError>().is_some_and(ExecuteError::is_fatal)
            || e.downcast_ref::<PollError>().is_some_and(PollError::is_fatal)
            || e.downcast_ref::<BatchError>().is_some_and(BatchError::is_fatal)
    })
}

fn succeeded(result: &TxResult, step: &str) -> Result<()> {
    ensure!(
        result.is_ok(),
        "{step}: expected success, got code {:?}",
        result.error_code()
    );
    info!(height = result.height, "{step}");
    Ok(())
}

fn rejected(result: &TxResult, step: &str) -> Result<()> {
    ensure!(!result.is_ok(), "{step}: expected rejection, got height {}", result.height);
    info!(code = ?result.error_code(), "{step}");
    Ok(())
}

async fn lifecycle(fixture: Arc<Fixture>) -> Result<()> {
    let client = fixture.client();
    let poller = fixture.poller();
    let (b, c, d) = (fixture.account(1), fixture.account(2), fixture.account(3));

    let existing = client
        .list_validators()
        .await?
        .into_iter()
        .next()
        .ok_or_eyre("no validator registered")?;

    let result = client
        .declare_candidacy(existing.owner_address, &fixture.pub_key(3), Description::default())
        .await?;
    rejected(&result, "declare from an existing validator account")?;
    let result = client
        .declare_candidacy(d, &encode_pub_key(&existing.pub_key), Description::default())
        .await?;
    rejected(&result, "declare with an existing validator key")?;
    let result = client
        .declare_candidacy(d, &fixture.pub_key(3), Description::default())
        .await?;
    succeeded(&result, "declare D")?;
    poller.wait_for_blocks(2).await?;

    let consensus = fixture.consensus().validators().await?;
    ensure!(
        consensus.validators().len() == 5,
        "expected 5 consensus validators, found {}",
        consensus.validators().len()
    );
    ensure!(
        consensus.power_of(&fixture.pub_key_raw(3)).is_some(),
        "D is not a consensus validator"
    );

    let result = client
        .verify_candidacy(fixture.foundation(), d, true)
        .await?;
    succeeded(&result, "foundation verifies D")?;
    let record = client.query_validator(d).await?.ok_or_eyre("D not found")?;
    ensure!(record.verified == Flag::Y, "D is not verified");
    ensure!(record.state == ValidatorState::Validator, "D is not a validator");

    for (name, who) in [("D", d), ("C", c)] {
        let result = client.deactivate_candidacy(who).await?;
        succeeded(&result, &format!("deactivate {name}"))?;
        poller.wait_for_blocks(1).await?;
        let record = client.query_validator(who).await?.ok_or_eyre("not found")?;
        ensure!(
            record.active == Flag::N && record.voting_power == 0,
            "{name} is still active"
        );
    }
    for (name, who) in [("D", d), ("C", c)] {
        let result = client.activate_candidacy(who).await?;
        succeeded(&result, &format!("activate {name}"))?;
        poller.wait_for_blocks(3).await?;
        let record = client.query_validator(who).await?.ok_or_eyre("not found")?;
        ensure!(
            record.active == Flag::Y && record.voting_power == 1000,
            "{name} is not active with voting power 1000"
        );
    }

    let website = "http://aaa.com";
    let description = Description {
        website: website.to_string(),
        ..Default::default()
    };
    let result = client
        .update_candidacy(d, Some(NEW_KEY), description)
        .await?;
    succeeded(&result, "update D's key and website")?;
    let record = client.query_validator(d).await?.ok_or_eyre("D not found")?;
    ensure!(encode_pub_key(&record.pub_key) == NEW_KEY, "D's key was not replaced");
    ensure!(record.description.website == website, "D's website was not replaced");
    ensure!(record.verified == Flag::N, "D is still verified after an update");

    let result = client.update_candidate_account(d, b).await?;
    rejected(&result, "move D onto a delegator's account")?;
    let new_account = fixture.new_account();
    let result = client.update_candidate_account(d, new_account).await?;
    succeeded(&result, "request moving D to a new account")?;
    let request_id = result.data_as_u64()?;
    let result = client.update_candidate_account(d, new_account).await?;
    rejected(&result, "request the same move again")?;
    let result = client
        .update_candidate_account(b, fixture.new_account())
        .await?;
    succeeded(&result, "request moving B to a new account")?;
    let result = client
        .accept_candidate_account_update(new_account, request_id)
        .await?;
    succeeded(&result, "new account accepts D")?;

    let result = client.withdraw_candidacy(new_account).await?;
    succeeded(&result, "withdraw D")?;
    poller.wait_for_blocks(3).await?;

    let listed = client.list_validators().await?;
    ensure!(
        listed.iter().all(|v| v.owner_address != new_account),
        "D is still registered"
    );
    let active = listed
        .iter()
        .filter(|v| v.state == ValidatorState::Validator)
        .count();
    ensure!(active == 4, "expected 4 validators, found {active}");
    let consensus = fixture.consensus().validators().await?;
    ensure!(
        consensus.validators().len() == 4
            && consensus.validators().iter().all(|v| v.voting_power == 1000),
        "consensus set is not 4 validators of power 1000"
    );
    Ok(())
}
