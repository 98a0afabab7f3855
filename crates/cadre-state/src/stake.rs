use cadre_types::lifecycle::Phase;
use cadre_types::transaction::{
    AcceptAccountUpdate, Declare, Update as UpdateCandidacy, UpdateAccount, Verify,
};
use cadre_types::validator::{Flag, PendingAccountUpdate, RequestState, ValidatorRecord};

use super::*;

/// Reject `tx` if its subject's current phase has no legal successor under it.
fn guard(subject: Option<&ValidatorRecord>, tx: &StakeTx) -> Result<(), StakeError> {
    Phase::of(subject).successors(tx)?;
    Ok(())
}

impl State {
    #[instrument(skip_all)]
    pub(crate) async fn declare_candidacy(
        &mut self,
        sender: Address,
        tx: &StakeTx,
        Declare {
            pub_key,
            description,
        }: &Declare,
        fee: u128,
    ) -> Result<(), TxFailure> {
        guard(self.candidate(sender).await?.as_ref(), tx)?;
        if self.candidate_by_pub_key(pub_key).await?.is_some() {
            return Err(StakeError::PubKeyAlreadyDeclared.into());
        }
        self.charge_gas(sender, fee).await?;

        let stake = self.params().await?.default_self_stake;
        let record = self
            .create_candidate(sender, *pub_key, stake, description.clone())
            .await?;
        info!(id = record.id, owner = %sender, "declared candidacy");
        Ok(())
    }

    pub(crate) async fn verify_candidacy(
        &mut self,
        sender: Address,
        tx: &StakeTx,
        Verify {
            candidate_address,
            verified,
        }: &Verify,
    ) -> Result<(), TxFailure> {
        let candidate = self.candidate(*candidate_address).await?;
        guard(candidate.as_ref(), tx)?;
        if sender != self.params().await?.foundation_address {
            return Err(StakeError::VerificationDisallowed.into());
        }

        let Some(mut record) = candidate else {
            return Err(StakeError::BadValidatorAddr.into());
        };
        record.verified = Flag::from(*verified);
        self.save_candidate(&record).await?;
        Ok(())
    }

    /// Replace the consensus key and/or description fields. Any change clears `verified`.
    ///
    /// A new key takes effect on the record at once; the consensus layer learns of it at the
    /// end of the block, as a removal of the old key and an addition of the new one.
    pub(crate) async fn update_candidacy(
        &mut self,
        sender: Address,
        tx: &StakeTx,
        UpdateCandidacy {
            pub_key,
            description,
        }: &UpdateCandidacy,
        fee: u128,
    ) -> Result<(), TxFailure> {
        let candidate = self.candidate(sender).await?;
        guard(candidate.as_ref(), tx)?;
        let Some(mut record) = candidate else {
            return Err(StakeError::BadValidatorAddr.into());
        };
        if let Some(pub_key) = pub_key
            && self.candidate_by_pub_key(pub_key).await?.is_some()
        {
            return Err(StakeError::PubKeyAlreadyDeclared.into());
        }
        self.charge_gas(sender, fee).await?;

        let mut changed = record.description.merge(description);
        if let Some(pub_key) = pub_key {
            record.pub_key = *pub_key;
            changed = true;
        }
        if changed {
            record.verified = Flag::N;
        }
        self.save_candidate(&record).await?;
        Ok(())
    }

    /// Leave the active set at once; the slot is refilled at the end of the block.
    pub(crate) async fn deactivate_candidacy(
        &mut self,
        sender: Address,
        tx: &StakeTx,
    ) -> Result<(), TxFailure> {
        let candidate = self.candidate(sender).await?;
        guard(candidate.as_ref(), tx)?;
        let Some(mut record) = candidate else {
            return Err(StakeError::BadValidatorAddr.into());
        };

        record.deactivated = true;
        record.set_membership(None);
        self.save_candidate(&record).await?;
        info!(id = record.id, owner = %sender, "deactivated candidacy");
        Ok(())
    }

    /// Become eligible again; admission happens at the end of the block if there is room.
    pub(crate) async fn activate_candidacy(
        &mut self,
        sender: Address,
        tx: &StakeTx,
    ) -> Result<(), TxFailure> {
        let candidate = self.candidate(sender).await?;
        guard(candidate.as_ref(), tx)?;
        let Some(mut record) = candidate else {
            return Err(StakeError::BadValidatorAddr.into());
        };

        record.deactivated = false;
        self.save_candidate(&record).await?;
        info!(id = record.id, owner = %sender, "activated candidacy");
        Ok(())
    }

    /// Open a request to move the sender's candidacy to another account, returning its id.
    pub(crate) async fn update_candidate_account(
        &mut self,
        sender: Address,
        UpdateAccount {
            new_candidate_account: target,
        }: &UpdateAccount,
        fee: u128,
    ) -> Result<u64, TxFailure> {
        let Some(mut record) = self.candidate(sender).await? else {
            return Err(StakeError::BadRequest.into());
        };
        let target = *target;
        if target.is_zero()
            || target == record.owner_address
            || record.pending_account_update_request.is_some()
            || self.candidate(target).await?.is_some()
            || self.is_account_update_target(target).await?
            || self.is_delegator(target).await?
        {
            return Err(StakeError::BadRequest.into());
        }
        self.charge_gas(sender, fee).await?;

        let request = self
            .create_account_update_request(record.id, sender, target)
            .await?;
        record.pending_account_update_request = Some(PendingAccountUpdate {
            request_id: request.id,
            from_address: sender,
            to_address: target,
        });
        self.save_candidate(&record).await?;
        info!(request = request.id, from = %sender, to = %target, "requested account update");
        Ok(request.id)
    }

    /// Move a candidacy to the account named by a pending request. Only that account may
    /// accept, and it pays the gas.
    pub(crate) async fn accept_candidate_account_update(
        &mut self,
        sender: Address,
        AcceptAccountUpdate {
            account_update_request_id: id,
        }: &AcceptAccountUpdate,
        fee: u128,
    ) -> Result<(), TxFailure> {
        let Some(mut request) = self.account_update_request(*id).await? else {
            return Err(StakeError::BadRequest.into());
        };
        if request.to_address != sender
            || request.state != RequestState::Pending
            || self.candidate(request.to_address).await?.is_some()
        {
            return Err(StakeError::BadRequest.into());
        }
        let Some(mut record) = self.candidate_by_id(request.candidate_id).await? else {
            return Err(StakeError::BadRequest.into());
        };
        self.charge_gas(sender, fee).await?;

        record.owner_address = request.to_address;
        record.pending_account_update_request = None;
        self.save_candidate(&record).await?;

        request.state = RequestState::Completed;
        request.accepted_block_height = self.block_height().await?;
        self.save_account_update_request(&request).await?;
        info!(request = request.id, owner = %sender, "accepted account update");
        Ok(())
    }

    /// Drop the candidacy entirely; the active set refills at the end of the block.
    pub(crate) async fn withdraw_candidacy(
        &mut self,
        sender: Address,
        tx: &StakeTx,
    ) -> Result<(), TxFailure> {
        let candidate = self.candidate(sender).await?;
        guard(candidate.as_ref(), tx)?;
        let Some(record) = candidate else {
            return Err(StakeError::BadValidatorAddr.into());
        };

        self.remove_candidate(&record).await;
        info!(id = record.id, owner = %sender, "withdrew candidacy");
        Ok(())
    }
}
