use serde::{Deserialize, Serialize};

use crate::{Address, PublicKey};

/// Free-form candidate metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Description {
    pub name: String,
    pub website: String,
    pub location: String,
    pub email: String,
    pub profile: String,
}

impl Description {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.website.is_empty()
            && self.location.is_empty()
            && self.email.is_empty()
            && self.profile.is_empty()
    }

    /// Overwrite every field that is non-empty in `other`, returning whether anything changed.
    pub fn merge(&mut self, other: &Description) -> bool {
        let mut changed = false;
        for (mine, theirs) in [
            (&mut self.name, &other.name),
            (&mut self.website, &other.website),
            (&mut self.location, &other.location),
            (&mut self.email, &other.email),
            (&mut self.profile, &other.profile),
        ] {
            if !theirs.is_empty() {
                *mine = theirs.clone();
                changed = true;
            }
        }
        changed
    }
}

/// A yes/no flag, serialized as `"Y"` or `"N"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    Y,
    #[default]
    N,
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        if value { Flag::Y } else { Flag::N }
    }
}

impl Flag {
    pub fn is_set(self) -> bool {
        self == Flag::Y
    }
}

/// Whether a registered candidate currently sits in the active consensus set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorState {
    #[default]
    Candidate,
    Validator,
}

/// Summary of a pending account update, attached to the record it would move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAccountUpdate {
    pub request_id: u64,
    pub from_address: Address,
    pub to_address: Address,
}

/// A registered validator candidate, as reported by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub id: u64,
    pub owner_address: Address,
    pub pub_key: PublicKey,
    /// Self-stake, in stake units.
    pub stake: u64,
    /// Zero unless the record is in the active set.
    pub voting_power: u64,
    /// Power of this key in the consensus layer's validator set, when known.
    #[serde(default)]
    pub tendermint_voting_power: u64,
    pub state: ValidatorState,
    /// Always `Y` exactly when `state` is `Validator`.
    pub active: Flag,
    /// Set when the owner asked to leave the active set.
    #[serde(default)]
    pub deactivated: bool,
    pub verified: Flag,
    pub description: Description,
    pub created_at: u64,
    pub block_height: u64,
    #[serde(default)]
    pub pending_account_update_request: Option<PendingAccountUpdate>,
}

impl ValidatorRecord {
    /// Whether the record competes for a slot in the active set.
    pub fn is_eligible(&self) -> bool {
        !self.deactivated
    }

    pub fn is_validator(&self) -> bool {
        self.state == ValidatorState::Validator
    }

    /// Move the record into or out of the active set, keeping `active` consistent with `state`.
    pub fn set_membership(&mut self, voting_power: Option<u64>) {
        match voting_power {
            Some(power) if power > 0 => {
                self.state = ValidatorState::Validator;
                self.active = Flag::Y;
                self.voting_power = power;
            }
            _ => {
                self.state = ValidatorState::Candidate;
                self.active = Flag::N;
                self.voting_power = 0;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestState {
    Pending,
    Completed,
}

/// A request to move a candidacy from one account to another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateRequest {
    pub id: u64,
    pub candidate_id: u64,
    pub from_address: Address,
    pub to_address: Address,
    pub created_block_height: u64,
    pub accepted_block_height: u64,
    pub state: RequestState,
}
