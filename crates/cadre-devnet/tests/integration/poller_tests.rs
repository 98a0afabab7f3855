//! Confirmation waits against a running devnet.

use std::sync::Arc;
use std::time::Duration;

use cadre_client::{Confirmation, PollError, Rpc, Timeouts};
use cadre_devnet::Fixture;
use cadre_types::transaction::{StakeTx, TxHash};
use cadre_types::validator::Description;
use color_eyre::eyre::bail;

use crate::constants::{BLOCK_INTERVAL, fixture_config};

/// A halted chain exhausts the wall-clock budget, which is reported as fatal.
#[tokio::test]
async fn test_halted_chain_is_fatal() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        fixture.devnet().halt();
        // Let a block that was already under way land first.
        tokio::time::sleep(BLOCK_INTERVAL * 2).await;
        let poller = fixture.poller().with_timeouts(Timeouts {
            blocks: 10,
            wall: BLOCK_INTERVAL * 10,
        });

        let height = fixture.devnet().current_block_height().await?;
        let error = poller.wait_for_blocks(1).await.unwrap_err();
        assert!(error.is_fatal());
        assert_eq!(
            error,
            PollError::Stalled {
                wall: BLOCK_INTERVAL * 10,
                height: Some(height),
            }
        );

        // The transaction sits in the mempool while no blocks are made.
        let broadcast = fixture
            .client()
            .submit(fixture.account(4), StakeTx::Withdraw)
            .await?;
        assert_eq!(broadcast.check_tx.code, 10);

        let broadcast = fixture
            .client()
            .submit(
                fixture.account(4),
                StakeTx::declare(&fixture.pub_key(4), Description::default())?,
            )
            .await?;
        assert!(broadcast.check_tx.is_ok());
        let error = poller
            .wait_for_transaction(broadcast.hash)
            .await
            .unwrap_err();
        assert!(error.is_fatal());

        // Teardown needs a live chain to withdraw the fake validators.
        fixture.devnet().resume();
        Ok(())
    })
    .await
}

/// A block budget smaller than the wait runs out while blocks are still coming.
#[tokio::test]
async fn test_block_budget_is_recoverable() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let poller = fixture.poller().with_timeouts(Timeouts {
            blocks: 2,
            wall: Duration::from_secs(10),
        });
        let error = poller.wait_for_blocks(5).await.unwrap_err();
        assert_eq!(error, PollError::BlockTimeout { blocks: 2 });
        assert!(!error.is_fatal());
        Ok(())
    })
    .await
}

/// A hash the node never saw is reported as not found once a block has passed.
#[tokio::test]
async fn test_unknown_transaction_is_not_found() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let start = fixture.devnet().current_block_height().await?;
        let confirmation = fixture
            .poller()
            .wait_for_transaction(TxHash([0xab; 32]))
            .await?;
        assert_eq!(confirmation, Confirmation::NotFound);
        assert!(fixture.devnet().current_block_height().await? > start);
        Ok(())
    })
    .await
}

/// Submitting the same envelope twice is turned away by the mempool.
#[tokio::test]
async fn test_duplicate_envelope_is_rejected() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let envelope = cadre_types::transaction::Envelope::new(
            fixture.account(4),
            u64::MAX,
            StakeTx::declare(&fixture.pub_key(4), Description::default())?,
        );
        let first = fixture.devnet().submit_transaction(envelope.clone()).await?;
        assert!(first.check_tx.is_ok());
        let second = fixture.devnet().submit_transaction(envelope).await?;
        assert_eq!(second.hash, first.hash);
        assert_eq!(second.check_tx.code, 3);

        let Confirmation::Included(included) =
            fixture.poller().wait_for_transaction(first.hash).await?
        else {
            bail!("declaration was dropped");
        };
        assert!(included.deliver_tx.is_ok());
        Ok(())
    })
    .await
}

/// Several transactions are awaited together; rejected ones have no handle to wait on.
#[tokio::test]
async fn test_wait_for_any_collects_every_outcome() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let client = fixture.client();
        let mut handles = vec![];
        for index in [4, 5] {
            let broadcast = client
                .submit(
                    fixture.account(index),
                    StakeTx::declare(&fixture.pub_key(index), Description::default())?,
                )
                .await?;
            handles.push(broadcast.check_tx.is_ok().then_some(broadcast.hash));
        }
        // Not a candidate, so the mempool rejects it.
        let rejected = client.submit(fixture.new_account(), StakeTx::Activate).await?;
        assert!(!rejected.check_tx.is_ok());
        handles.push(rejected.check_tx.is_ok().then_some(rejected.hash));

        let outcomes = fixture.poller().wait_for_any(handles).await?;
        assert_eq!(outcomes.len(), 2);
        for confirmation in outcomes.values() {
            let Confirmation::Included(included) = confirmation else {
                bail!("declaration was dropped");
            };
            assert!(included.deliver_tx.is_ok());
        }

        let results = client
            .execute_many([
                (fixture.account(4), StakeTx::Deactivate),
                (fixture.account(5), StakeTx::Deactivate),
                (fixture.account(5), StakeTx::Deactivate),
            ])
            .await?;
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert_eq!(results[2].error_code(), Some(15));
        Ok(())
    })
    .await
}

/// A batch with one transaction stuck behind a halted chain still reports the one that landed,
/// and is fatal as a whole.
#[tokio::test]
async fn test_stalled_batch_is_fatal() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let client = fixture.client();
        let landed = client
            .submit(
                fixture.account(4),
                StakeTx::declare(&fixture.pub_key(4), Description::default())?,
            )
            .await?;
        fixture.poller().wait_for_transaction(landed.hash).await?;

        fixture.devnet().halt();
        tokio::time::sleep(BLOCK_INTERVAL * 2).await;
        let stuck = client
            .submit(
                fixture.account(5),
                StakeTx::declare(&fixture.pub_key(5), Description::default())?,
            )
            .await?;
        assert!(stuck.check_tx.is_ok());

        let wall = BLOCK_INTERVAL * 10;
        let error = fixture
            .poller()
            .with_timeouts(Timeouts { blocks: 10, wall })
            .wait_for_any([Some(landed.hash), Some(stuck.hash)])
            .await
            .unwrap_err();
        assert!(error.is_fatal());
        assert!(matches!(
            error.outcomes[&landed.hash],
            Ok(Confirmation::Included(_))
        ));
        assert!(matches!(
            error.outcomes[&stuck.hash],
            Err(PollError::Stalled { wall: w, height: Some(_) }) if w == wall
        ));

        fixture.devnet().resume();
        Ok(())
    })
    .await
}

/// A spawned wait can be left running, checked on, and cancelled.
#[tokio::test]
async fn test_spawned_waits_can_be_cancelled() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let poller = fixture.poller();
        let mut long = poller.spawn_wait_for_blocks(1_000);
        assert!(long.wait_timeout(BLOCK_INTERVAL * 2).await.is_none());
        assert!(!long.is_finished());
        long.cancel();

        let short = poller.spawn_wait_for_blocks(2);
        let height = short.wait().await?;
        assert!(height >= 2);
        Ok(())
    })
    .await
}
