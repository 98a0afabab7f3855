//! The HTTP validator set endpoint, read as a CometBFT client would.

use std::sync::Arc;

use cadre_client::Rpc;
use cadre_devnet::{Fixture, MIN_VALIDATORS};
use cadre_types::key::encode_pub_key;

use crate::constants::fixture_config;

/// GET `/validators` lists the consensus set with its power as a decimal string.
#[tokio::test]
async fn test_validators_endpoint_matches_consensus_set() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        // Validators declared by the fixture reach consensus two blocks after their block.
        fixture.poller().wait_for_blocks(2).await?;

        let url = fixture.consensus().base().join("validators")?;
        let body: serde_json::Value = reqwest::get(url).await?.error_for_status()?.json().await?;
        let listed = body["result"]["validators"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(listed.len(), MIN_VALIDATORS);
        for validator in &listed {
            assert_eq!(validator["voting_power"], "1000");
            assert_eq!(validator["pub_key"]["type"], "tendermint/PubKeyEd25519");
        }

        let typed = fixture.consensus().validators().await?;
        assert_eq!(typed, fixture.devnet().consensus_validators().await?);
        let genesis_key = encode_pub_key(&cadre_devnet::dev_key(cadre_devnet::GENESIS_SEED));
        assert!(
            listed
                .iter()
                .any(|v| v["pub_key"]["value"] == genesis_key.as_str())
        );
        Ok(())
    })
    .await
}

/// The staking views answer with JSON records, and 404 for unknown owners.
#[tokio::test]
async fn test_candidate_routes() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let base = fixture.consensus().base().clone();

        let candidates: serde_json::Value = reqwest::get(base.join("candidates")?)
            .await?
            .error_for_status()?
            .json()
            .await?;
        assert_eq!(
            candidates.as_array().map(Vec::len),
            Some(MIN_VALIDATORS)
        );

        let owner = fixture.account(0);
        let record: serde_json::Value = reqwest::get(base.join(&format!("candidates/{owner}"))?)
            .await?
            .error_for_status()?
            .json()
            .await?;
        assert_eq!(record["owner_address"], owner.to_string());
        assert_eq!(record["state"], "Validator");

        let missing = reqwest::get(base.join(&format!("candidates/{}", fixture.new_account()))?)
            .await?;
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let invalid = reqwest::get(base.join("candidates/not-an-address")?).await?;
        assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);
        Ok(())
    })
    .await
}
