//! Setup and teardown guarantees of the scoped fixture.

use std::sync::{Arc, Mutex};

use cadre_client::Rpc;
use cadre_devnet::{Fixture, MIN_VALIDATORS};
use color_eyre::eyre::{OptionExt, eyre};

use crate::constants::fixture_config;

type Captured = Arc<Mutex<Option<Arc<Fixture>>>>;

/// Keep a handle on the fixture past the end of its scope.
fn capture(slot: &Captured, fixture: &Arc<Fixture>) {
    if let Ok(mut slot) = slot.lock() {
        *slot = Some(fixture.clone());
    }
}

fn captured(slot: &Captured) -> color_eyre::Result<Arc<Fixture>> {
    slot.lock()
        .map_err(|_| eyre!("capture slot poisoned"))?
        .clone()
        .ok_or_eyre("scenario never ran")
}

/// Only the genesis validator is left once the fixture is gone.
async fn assert_torn_down(fixture: &Fixture) -> color_eyre::Result<()> {
    let remaining = fixture.devnet().list_validators().await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].owner_address, fixture.genesis_owner());
    Ok(())
}

#[tokio::test]
async fn test_setup_tops_up_validators() -> color_eyre::Result<()> {
    let slot = Captured::default();
    let seen = Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| {
        capture(&slot, &fixture);
        async move { Ok(fixture.devnet().list_validators().await?.len()) }
    })
    .await?;
    assert_eq!(seen, MIN_VALIDATORS);
    assert_torn_down(&captured(&slot)?).await
}

#[tokio::test]
async fn test_teardown_runs_after_failure() -> color_eyre::Result<()> {
    let slot = Captured::default();
    let outcome: color_eyre::Result<()> =
        Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| {
            capture(&slot, &fixture);
            async move { Err(eyre!("scenario failed")) }
        })
        .await;

    let error = outcome.unwrap_err();
    assert_eq!(error.to_string(), "scenario failed");
    assert_torn_down(&captured(&slot)?).await
}

#[tokio::test]
async fn test_teardown_runs_after_panic() -> color_eyre::Result<()> {
    let slot = Captured::default();
    let scoped = {
        let slot = slot.clone();
        tokio::spawn(async move {
            Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| {
                capture(&slot, &fixture);
                async move {
                    assert_eq!(fixture.account(0), fixture.genesis_owner(), "scenario panicked");
                    Ok(())
                }
            })
            .await
        })
    };

    let joined = scoped.await;
    assert!(joined.is_err_and(|e| e.is_panic()));
    assert_torn_down(&captured(&slot)?).await
}

#[tokio::test]
async fn test_accounts_are_distinct_and_funded() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let pool: Vec<_> = (0..6).map(|i| fixture.account(i)).collect();
        assert_eq!(fixture.try_account(5), Some(pool[5]));
        assert_eq!(fixture.try_account(6), None);
        let fresh = fixture.new_account();
        assert!(!pool.contains(&fresh));
        assert_ne!(fresh, fixture.new_account());

        for account in pool {
            assert!(fixture.devnet().balance(account).await? > 0);
        }
        assert_eq!(fixture.devnet().balance(fresh).await?, 0);
        Ok(())
    })
    .await
}
