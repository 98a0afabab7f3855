use std::collections::BTreeMap;

use cadre_types::key::{consensus_address, key_id};
use cadre_types::validator::ValidatorRecord;

use super::*;

/// A member of the validator set last handed to the consensus layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusEntry {
    pub pub_key: PublicKey,
    pub power: u64,
}

impl State {
    /// The validator set as of the last end of block, ordered by key.
    pub async fn consensus_set(&self) -> Result<Vec<ConsensusEntry>, Report> {
        let mut entries = vec![];
        let mut stream = Box::pin(
            self.store
                .prefix::<ConsensusEntry>(Stake, "consensus/")
                .await,
        );
        while let Some(entry) = stream.next().await {
            let (_, entry) = entry?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Recompute every candidate's membership and voting power, and diff the resulting set
    /// against the one last handed to consensus.
    ///
    /// Eligible candidates are ranked by voting power, highest first, with ties going to the
    /// lower consensus address; the first `max_validators` of them form the active set.
    pub(crate) async fn update_validator_set(&mut self) -> Result<Vec<Update>, Report> {
        let params = self.params().await?;

        let mut ranked: Vec<ValidatorRecord> = self
            .candidates()
            .await?
            .into_iter()
            .filter(ValidatorRecord::is_eligible)
            .collect();
        ranked.sort_by_cached_key(|record| {
            (
                std::cmp::Reverse(params.voting_power(record.stake)),
                consensus_address(&record.pub_key),
            )
        });

        let mut active = BTreeMap::new();
        for record in ranked.iter().take(params.max_validators) {
            let power = params.voting_power(record.stake);
            if power > 0 {
                active.insert(record.id, power);
            }
        }

        let mut next_set = BTreeMap::new();
        for mut record in self.candidates().await? {
            let power = active.get(&record.id).copied();
            let before = (record.state, record.voting_power);
            record.set_membership(power);
            if before != (record.state, record.voting_power) {
                debug!(
                    id = record.id,
                    owner = %record.owner_address,
                    state = ?record.state,
                    voting_power = record.voting_power,
                    "membership changed"
                );
                self.save_candidate(&record).await?;
            }
            if let Some(power) = power {
                next_set.insert(
                    key_id(&record.pub_key),
                    ConsensusEntry {
                        pub_key: record.pub_key,
                        power,
                    },
                );
            }
        }

        let previous_set: BTreeMap<String, ConsensusEntry> = self
            .consensus_set()
            .await?
            .into_iter()
            .map(|entry| (key_id(&entry.pub_key), entry))
            .collect();

        // CometBFT convention: power 0 removes a validator.
        let mut updates = vec![];
        for (id, entry) in &previous_set {
            if !next_set.contains_key(id) {
                self.store.delete(Stake, &format!("consensus/{id}")).await;
                updates.push(Update {
                    pub_key: entry.pub_key,
                    power: Power::from(0u32),
                });
            }
        }
        for (id, entry) in &next_set {
            if previous_set.get(id) != Some(entry) {
                self.store
                    .put(Stake, &format!("consensus/{id}"), entry)
                    .await?;
                updates.push(Update {
                    pub_key: entry.pub_key,
                    power: Power::try_from(entry.power)?,
                });
            }
        }

        Ok(updates)
    }
}
