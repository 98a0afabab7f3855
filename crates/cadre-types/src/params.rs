use serde::{Deserialize, Serialize};

use crate::Address;
use crate::transaction::{StakeTx, TxKind};

/// The default foundation account, the only sender allowed to verify candidates.
pub const DEFAULT_FOUNDATION_ADDRESS: Address = Address::new([
    0x7e, 0xff, 0x12, 0x2b, 0x94, 0x89, 0x7e, 0xa5, 0xb0, 0xe2, 0xa9, 0xab, 0xf4, 0x7b, 0x86, 0x33,
    0x7f, 0xaf, 0xeb, 0xdc,
]);

/// Chain-wide staking parameters, fixed at genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub declare_candidacy_gas: u64,
    pub update_candidacy_gas: u64,
    pub update_candidate_account_gas: u64,
    pub accept_candidate_account_update_request_gas: u64,
    /// Price per unit of gas, in the smallest balance unit.
    pub gas_price: u64,
    pub foundation_address: Address,
    /// Upper bound on the size of the active validator set.
    pub max_validators: usize,
    /// Voting power granted per unit of self-stake.
    pub voting_power_per_stake: u64,
    /// Self-stake assigned to a newly declared candidate.
    pub default_self_stake: u64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            declare_candidacy_gas: 1_000_000,
            update_candidacy_gas: 1_000_000,
            update_candidate_account_gas: 1_000_000,
            accept_candidate_account_update_request_gas: 1_000_000,
            gas_price: 0,
            foundation_address: DEFAULT_FOUNDATION_ADDRESS,
            max_validators: 5,
            voting_power_per_stake: 1000,
            default_self_stake: 1,
        }
    }
}

impl Params {
    /// Gas charged for an operation. Activation, deactivation, verification and withdrawal are
    /// free.
    pub fn gas_limit(&self, kind: TxKind) -> u64 {
        match kind {
            TxKind::Declare => self.declare_candidacy_gas,
            TxKind::Update => self.update_candidacy_gas,
            TxKind::UpdateAccount => self.update_candidate_account_gas,
            TxKind::AcceptAccountUpdate => self.accept_candidate_account_update_request_gas,
            TxKind::Verify | TxKind::Deactivate | TxKind::Activate | TxKind::Withdraw => 0,
        }
    }

    /// The fee debited from the sender when `tx` is delivered.
    pub fn gas_fee(&self, tx: &StakeTx) -> u128 {
        u128::from(self.gas_limit(tx.kind())) * u128::from(self.gas_price)
    }

    /// Voting power of an active record with the given self-stake.
    pub fn voting_power(&self, stake: u64) -> u64 {
        stake.saturating_mul(self.voting_power_per_stake)
    }
}
