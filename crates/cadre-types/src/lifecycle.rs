//! The lifecycle of a validator candidacy.
//!
//! ```text
//!                 declare
//!   NonExistent ───────────► Candidate{eligible} ◄──────► Validator
//!        ▲                      │      ▲     admission/eviction by power
//!        │ withdraw             │      │ activate
//!        │            deactivate│      │
//!        └──────────────── Candidate{deactivated}
//! ```
//!
//! Which of the two eligible phases a record lands in after `declare` or `activate` depends on
//! active-set capacity, which only the chain knows; [`Phase::successors`] reports every phase
//! the record may legally occupy once the operation is confirmed.

use crate::transaction::StakeTx;
use crate::validator::ValidatorRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    NonExistent,
    /// Registered but outside the active set.
    Candidate {
        /// The owner asked to leave the set; an eligible candidate is only waiting for room.
        deactivated: bool,
    },
    /// In the active set with non-zero voting power.
    Validator,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalTransition {
    #[error("no candidacy has been declared")]
    NotDeclared,
    #[error("candidacy has already been declared")]
    AlreadyDeclared,
    #[error("candidate has already been activated")]
    AlreadyActivated,
    #[error("candidate has already been deactivated")]
    AlreadyDeactivated,
}

impl Phase {
    pub fn of(record: Option<&ValidatorRecord>) -> Phase {
        match record {
            None => Phase::NonExistent,
            Some(record) if record.is_validator() => Phase::Validator,
            Some(record) => Phase::Candidate {
                deactivated: record.deactivated,
            },
        }
    }

    pub fn exists(self) -> bool {
        self != Phase::NonExistent
    }

    /// The phases the subject of `tx` may occupy after `tx` takes effect.
    ///
    /// The subject is the sender's record for every operation except `verify`, whose subject is
    /// the candidate being verified.
    pub fn successors(self, tx: &StakeTx) -> Result<Vec<Phase>, IllegalTransition> {
        use Phase::*;

        const ELIGIBLE: [Phase; 2] = [Candidate { deactivated: false }, Validator];

        match (self, tx) {
            (NonExistent, StakeTx::Declare(_)) => Ok(ELIGIBLE.to_vec()),
            (_, StakeTx::Declare(_)) => Err(IllegalTransition::AlreadyDeclared),
            (NonExistent, _) => Err(IllegalTransition::NotDeclared),

            (Candidate { deactivated: true }, StakeTx::Activate) => Ok(ELIGIBLE.to_vec()),
            (_, StakeTx::Activate) => Err(IllegalTransition::AlreadyActivated),

            (Candidate { deactivated: true }, StakeTx::Deactivate) => {
                Err(IllegalTransition::AlreadyDeactivated)
            }
            (_, StakeTx::Deactivate) => Ok(vec![Candidate { deactivated: true }]),

            (_, StakeTx::Withdraw) => Ok(vec![NonExistent]),

            // Attribute-only updates; membership may still shift if the key changes, but only
            // between the phases the record could already occupy.
            (Candidate { deactivated: true }, _) => Ok(vec![self]),
            (_, StakeTx::Verify(_) | StakeTx::Update(_))
            | (_, StakeTx::UpdateAccount(_) | StakeTx::AcceptAccountUpdate(_)) => {
                Ok(ELIGIBLE.to_vec())
            }
        }
    }
}
