use cadre_types::key::key_id;
use cadre_types::validator::{Flag, ValidatorRecord, ValidatorState};

use super::*;

fn by_id(id: u64) -> String {
    format!("candidates/by_id/{id:020}")
}

fn by_address(address: Address) -> String {
    format!("candidates/by_address/{address}")
}

fn by_pub_key(pub_key: &PublicKey) -> String {
    format!("candidates/by_pub_key/{}", key_id(pub_key))
}

impl State {
    /// The candidate owned by `address`, if any.
    pub async fn candidate(&self, address: Address) -> Result<Option<ValidatorRecord>, Report> {
        match self.store.get::<u64>(Stake, &by_address(address)).await? {
            Some(id) => self.candidate_by_id(id).await,
            None => Ok(None),
        }
    }

    pub async fn candidate_by_id(&self, id: u64) -> Result<Option<ValidatorRecord>, Report> {
        self.store.get(Stake, &by_id(id)).await
    }

    /// The candidate currently declaring `pub_key` as its consensus key, if any.
    pub async fn candidate_by_pub_key(
        &self,
        pub_key: &PublicKey,
    ) -> Result<Option<ValidatorRecord>, Report> {
        match self.store.get::<u64>(Stake, &by_pub_key(pub_key)).await? {
            Some(id) => self.candidate_by_id(id).await,
            None => Ok(None),
        }
    }

    /// All candidates, in order of declaration.
    pub async fn candidates(&self) -> Result<Vec<ValidatorRecord>, Report> {
        let mut candidates = vec![];
        let mut stream = Box::pin(
            self.store
                .prefix::<ValidatorRecord>(Stake, "candidates/by_id/")
                .await,
        );
        while let Some(entry) = stream.next().await {
            let (_, record) = entry?;
            candidates.push(record);
        }
        Ok(candidates)
    }

    /// Create a new candidate owned by `owner`, outside the active set.
    pub(crate) async fn create_candidate(
        &mut self,
        owner: Address,
        pub_key: PublicKey,
        stake: u64,
        description: Description,
    ) -> Result<ValidatorRecord, Report> {
        let record = ValidatorRecord {
            id: self.next_id("candidate").await?,
            owner_address: owner,
            pub_key,
            stake,
            voting_power: 0,
            tendermint_voting_power: 0,
            state: ValidatorState::Candidate,
            active: Flag::N,
            deactivated: false,
            verified: Flag::N,
            description,
            created_at: self.block_time().await?,
            block_height: self.block_height().await?,
            pending_account_update_request: None,
        };
        self.save_candidate(&record).await?;
        Ok(record)
    }

    pub(crate) async fn declare_genesis_candidate(
        &mut self,
        validator: &GenesisValidator,
    ) -> Result<(), Report> {
        if validator.owner_address.is_zero() {
            bail!("genesis validator cannot be owned by the zero address");
        }
        if self.candidate(validator.owner_address).await?.is_some() {
            bail!(
                "genesis validator {} is declared twice",
                validator.owner_address
            );
        }
        if self.candidate_by_pub_key(&validator.pub_key).await?.is_some() {
            bail!(
                "genesis validator {} reuses a consensus key",
                validator.owner_address
            );
        }

        let stake = match validator.stake {
            Some(stake) => stake,
            None => self.params().await?.default_self_stake,
        };
        let record = self
            .create_candidate(
                validator.owner_address,
                validator.pub_key,
                stake,
                validator.description.clone(),
            )
            .await?;
        debug!(id = record.id, owner = %record.owner_address, "declared genesis validator");
        Ok(())
    }

    /// Write a candidate and keep its address and key indexes pointing at it.
    pub(crate) async fn save_candidate(&mut self, record: &ValidatorRecord) -> Result<(), Report> {
        if let Some(previous) = self.candidate_by_id(record.id).await? {
            if previous.owner_address != record.owner_address {
                self.store
                    .delete(Stake, &by_address(previous.owner_address))
                    .await;
            }
            if previous.pub_key != record.pub_key {
                self.store.delete(Stake, &by_pub_key(&previous.pub_key)).await;
            }
        }

        self.store.put(Stake, &by_id(record.id), record).await?;
        self.store
            .put(Stake, &by_address(record.owner_address), record.id)
            .await?;
        self.store
            .put(Stake, &by_pub_key(&record.pub_key), record.id)
            .await?;
        Ok(())
    }

    pub(crate) async fn remove_candidate(&mut self, record: &ValidatorRecord) {
        self.store.delete(Stake, &by_id(record.id)).await;
        self.store
            .delete(Stake, &by_address(record.owner_address))
            .await;
        self.store.delete(Stake, &by_pub_key(&record.pub_key)).await;
    }
}
