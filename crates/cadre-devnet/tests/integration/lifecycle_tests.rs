//! The validator lifecycle, driven through the client and observed through queries.
//!
//! The pool's first four accounts play A, B, C and D. A, B and C are the fixture's throwaway
//! validators; D declares during the scenario, which fills the fifth and last slot of the
//! active set.

use std::sync::Arc;

use cadre_devnet::Fixture;
use cadre_types::key::encode_pub_key;
use cadre_types::validator::{Description, Flag, ValidatorState};
use color_eyre::eyre::OptionExt;

use crate::constants::{UPDATED_KEY, fixture_config};

const B: usize = 1;
const C: usize = 2;
const D: usize = 3;

/// Declare D and wait until the consensus layer runs with it.
async fn declare_d(fixture: &Fixture) -> color_eyre::Result<()> {
    let result = fixture
        .client()
        .declare_candidacy(fixture.account(D), &fixture.pub_key(D), Description::default())
        .await?;
    assert!(result.is_ok(), "declaration failed: {result:?}");
    fixture.poller().wait_for_blocks(2).await?;
    Ok(())
}

/// Walks a candidate through every lifecycle operation, checking the record and the consensus
/// set after each step.
///
/// # Steps
///
/// 1. Declarations colliding with an existing owner or key fail; D's succeeds and D becomes the
///    fifth validator on the consensus layer
/// 2. Only the foundation may verify D
/// 3. Deactivating D and C drops them to candidates with no voting power; activating them
///    restores both
/// 4. Updating D's key and website clears `verified`
/// 5. Account updates to a delegator or to a used target fail; D's move to a fresh account is
///    accepted by that account
/// 6. Withdrawing from the new account leaves four validators of power 1000
#[tokio::test]
async fn test_validator_lifecycle() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let client = fixture.client();
        let d = fixture.account(D);

        // 1. Declaration.
        let existing = client
            .list_validators()
            .await?
            .into_iter()
            .next()
            .ok_or_eyre("no genesis validator")?;
        let result = client
            .declare_candidacy(existing.owner_address, &fixture.pub_key(D), Description::default())
            .await?;
        assert_eq!(result.height, 0, "existing owner declared again");
        let result = client
            .declare_candidacy(d, &encode_pub_key(&existing.pub_key), Description::default())
            .await?;
        assert_eq!(result.height, 0, "existing key declared again");

        declare_d(&fixture).await?;
        let validators = fixture.consensus().validators().await?;
        assert_eq!(validators.validators().len(), 5);
        assert_eq!(
            validators.power_of(&fixture.pub_key_raw(D)),
            Some(1000),
            "D missing from the consensus set"
        );

        // 2. Verification.
        let result = client.verify_candidacy(d, d, true).await?;
        assert_eq!(result.error_code(), Some(13));
        let result = client.verify_candidacy(fixture.foundation(), d, true).await?;
        assert!(result.is_ok());
        let listed = client.list_validators().await?;
        assert!(
            listed
                .iter()
                .any(|v| v.owner_address == d && v.verified == Flag::Y)
        );

        let record = client.query_validator(d).await?.ok_or_eyre("D not found")?;
        assert_eq!(record.owner_address, d);
        assert_eq!(record.verified, Flag::Y);
        assert_eq!(record.pub_key, fixture.pub_key_raw(D));
        assert_eq!(record.state, ValidatorState::Validator);

        // 3. Deactivation and activation.
        for who in [D, C] {
            let result = client.deactivate_candidacy(fixture.account(who)).await?;
            assert!(result.is_ok());
            fixture.poller().wait_for_blocks(1).await?;

            let record = client
                .query_validator(fixture.account(who))
                .await?
                .ok_or_eyre("candidate not found")?;
            assert_eq!(record.active, Flag::N);
            assert_eq!(record.state, ValidatorState::Candidate);
            assert_eq!(record.voting_power, 0);
        }
        for who in [D, C] {
            let result = client.activate_candidacy(fixture.account(who)).await?;
            assert!(result.is_ok());
            fixture.poller().wait_for_blocks(3).await?;

            let record = client
                .query_validator(fixture.account(who))
                .await?
                .ok_or_eyre("candidate not found")?;
            assert_eq!(record.active, Flag::Y);
            assert_eq!(record.state, ValidatorState::Validator);
            assert_eq!(record.voting_power, 1000);
            assert_eq!(record.tendermint_voting_power, 1000);
        }

        // 4. Update.
        let website = "http://aaa.com";
        let result = client
            .update_candidacy(
                d,
                Some(UPDATED_KEY),
                Description {
                    website: website.to_string(),
                    ..Default::default()
                },
            )
            .await?;
        assert!(result.is_ok());
        let record = client.query_validator(d).await?.ok_or_eyre("D not found")?;
        assert_eq!(encode_pub_key(&record.pub_key), UPDATED_KEY);
        assert_eq!(record.description.website, website);
        assert_eq!(record.verified, Flag::N);

        fixture.poller().wait_for_blocks(2).await?;
        assert!(!fixture.in_consensus(&fixture.pub_key_raw(D)).await?);
        assert!(fixture.in_consensus(&record.pub_key).await?);

        // 5. Account update.
        let result = client
            .update_candidate_account(d, fixture.account(B))
            .await?;
        assert_eq!(result.error_code(), Some(16), "moved onto a delegator");

        let new_account = fixture.new_account();
        let result = client.update_candidate_account(d, new_account).await?;
        assert!(result.is_ok());
        let request_id = result.data_as_u64()?;

        let result = client.update_candidate_account(d, new_account).await?;
        assert_eq!(result.height, 0, "target used twice");

        let new_account_2 = fixture.new_account();
        let result = client
            .update_candidate_account(fixture.account(B), new_account_2)
            .await?;
        assert!(result.is_ok());
        let request_id_2 = result.data_as_u64()?;
        assert_ne!(request_id, request_id_2);

        let result = client
            .accept_candidate_account_update(new_account_2, request_id)
            .await?;
        assert_eq!(result.height, 0, "accepted by the wrong account");
        let result = client
            .accept_candidate_account_update(new_account, request_id)
            .await?;
        assert!(result.is_ok());

        // 6. Withdrawal.
        let result = client.withdraw_candidacy(new_account).await?;
        assert!(result.is_ok());
        fixture.poller().wait_for_blocks(3).await?;

        let listed = client.list_validators().await?;
        assert!(listed.iter().all(|v| v.owner_address != new_account));
        let validators = listed
            .iter()
            .filter(|v| v.state == ValidatorState::Validator)
            .count();
        assert_eq!(validators, 4);

        let consensus = fixture.consensus().validators().await?;
        assert_eq!(consensus.validators().len(), 4);
        assert!(consensus.validators().iter().all(|v| v.voting_power == 1000));
        Ok(())
    })
    .await
}

/// Moving a candidacy to a new account keeps the record intact apart from its owner.
#[tokio::test]
async fn test_account_update_moves_the_record() -> color_eyre::Result<()> {
    Fixture::scoped(fixture_config(), |fixture: Arc<Fixture>| async move {
        let client = fixture.client();
        let d = fixture.account(D);
        declare_d(&fixture).await?;
        let before = client.query_validator(d).await?.ok_or_eyre("D not found")?;

        let d2 = fixture.new_account();
        let result = client.update_candidate_account(d, d2).await?;
        assert!(result.is_ok());
        let request_id = result.data_as_u64()?;

        let pending = client.query_validator(d).await?.ok_or_eyre("D not found")?;
        let pending = pending
            .pending_account_update_request
            .ok_or_eyre("no pending request")?;
        assert_eq!(pending.request_id, request_id);
        assert_eq!(pending.to_address, d2);

        let result = client.accept_candidate_account_update(d2, request_id).await?;
        assert!(result.is_ok());

        assert!(client.query_validator(d).await?.is_none());
        let after = client.query_validator(d2).await?.ok_or_eyre("D2 not found")?;
        assert_eq!(after.owner_address, d2);
        assert_eq!(after.id, before.id);
        assert_eq!(after.pub_key, before.pub_key);
        assert_eq!(after.description, before.description);
        assert_eq!(after.state, before.state);
        assert_eq!(after.voting_power, before.voting_power);
        assert!(after.pending_account_update_request.is_none());

        // The block before the move still shows D as the owner.
        let old = client.query_validator_at(d, result.height - 1).await?;
        assert!(old.is_some());

        let result = client.accept_candidate_account_update(d2, request_id).await?;
        assert_eq!(result.height, 0, "request accepted twice");
        Ok(())
    })
    .await
}
