use std::collections::{BTreeMap, VecDeque};

use cadre_types::PublicKey;
use cadre_types::key::key_id;
use cadre_types::response::{ConsensusValidator, ConsensusValidators, ValidatorSet};
use tendermint::validator::Update;

/// The validator set as the consensus engine sees it.
///
/// Updates returned at the end of block `h` only take effect from block `h + delay`, as with
/// CometBFT, where the delay is 2.
#[derive(Debug)]
pub(crate) struct ConsensusLayer {
    delay: u64,
    height: u64,
    active: BTreeMap<String, ConsensusValidator>,
    scheduled: VecDeque<(u64, Vec<Update>)>,
}

impl ConsensusLayer {
    /// The consensus layer at genesis, where the initial set applies at once.
    pub fn genesis(delay: u64, updates: Vec<Update>) -> Self {
        let mut layer = ConsensusLayer {
            delay,
            height: 0,
            active: BTreeMap::new(),
            scheduled: VecDeque::new(),
        };
        layer.apply(updates);
        layer
    }

    /// Record the end of block `height` with the updates it produced.
    pub fn advance(&mut self, height: u64, updates: Vec<Update>) {
        self.height = height;
        if !updates.is_empty() {
            self.scheduled.push_back((height + self.delay, updates));
        }
        while let Some((due, _)) = self.scheduled.front()
            && *due <= height
        {
            if let Some((_, updates)) = self.scheduled.pop_front() {
                debug!(height, updates = updates.len(), "applying validator updates");
                self.apply(updates);
            }
        }
    }

    fn apply(&mut self, updates: Vec<Update>) {
        for Update { pub_key, power } in updates {
            let id = key_id(&pub_key);
            match power.value() {
                0 => {
                    self.active.remove(&id);
                }
                voting_power => {
                    self.active.insert(
                        id,
                        ConsensusValidator {
                            pub_key,
                            voting_power,
                        },
                    );
                }
            }
        }
    }

    pub fn power_of(&self, pub_key: &PublicKey) -> u64 {
        self.active
            .get(&key_id(pub_key))
            .map_or(0, |v| v.voting_power)
    }

    pub fn validators(&self) -> ConsensusValidators {
        ConsensusValidators {
            result: ValidatorSet {
                block_height: self.height,
                validators: self.active.values().cloned().collect(),
            },
        }
    }
}
