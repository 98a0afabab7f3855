//! The validator registry as executed by the chain.
//!
//! [`State`] owns a [`Store`] and applies staking requests to it, one block at a time:
//! [`State::init_chain`] once, then for every block [`State::begin_block`], any number of
//! [`State::deliver_tx`], [`State::end_block`] and [`State::commit`]. Requests are checked
//! against the same rules before they enter a block, by running them on a fork.

#[macro_use]
extern crate tracing;

use cadre_types::{
    Address, Params, PublicKey,
    response::ExecResult,
    transaction::{Envelope, StakeTx},
    validator::Description,
};
use color_eyre::{
    Report,
    eyre::{OptionExt, bail},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tendermint::{validator::Update, vote::Power};

mod store;
pub use store::{Store, Substore};
use store::Substore::{Bank, Chain, Stake};

mod error;
pub use error::StakeError;

mod account_update;
mod bank;
mod candidate;
mod chain;
mod stake;
mod validator_set;

pub use bank::HOLD_ACCOUNT;
pub use validator_set::ConsensusEntry;

/// Initial chain state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Genesis {
    pub chain_id: String,
    pub params: Params,
    pub validators: Vec<GenesisValidator>,
    pub balances: Vec<GenesisBalance>,
    pub delegations: Vec<GenesisDelegation>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub owner_address: Address,
    pub pub_key: PublicKey,
    /// Self-stake; defaults to the chain's `default_self_stake`.
    #[serde(default)]
    pub stake: Option<u64>,
    #[serde(default)]
    pub description: Description,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub address: Address,
    pub amount: u128,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisDelegation {
    pub delegator: Address,
    pub candidate: Address,
    pub amount: u64,
}

pub struct State {
    store: Store,
}

/// Why a transaction did not apply: either the request broke a staking rule, or the store
/// itself failed.
enum TxFailure {
    Rejected(StakeError),
    Fault(Report),
}

impl From<StakeError> for TxFailure {
    fn from(e: StakeError) -> Self {
        TxFailure::Rejected(e)
    }
}

impl From<Report> for TxFailure {
    fn from(e: Report) -> Self {
        TxFailure::Fault(e)
    }
}

impl State {
    /// Create a new state with the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A logical fork of this state; changes to it are invisible here.
    pub async fn fork(&self) -> Self {
        Self {
            store: self.store.fork().await,
        }
    }

    /// The committed state as of the end of block `height`, if storage still holds it.
    pub fn at_height(&self, height: u64) -> Option<Self> {
        Some(Self {
            store: self.store.at_version(height)?,
        })
    }

    /// Adopt everything applied to `fork` since it was taken from this state.
    pub async fn absorb(&mut self, fork: State) {
        self.store.absorb(fork.store).await;
    }

    /// Initialize the chain state, returning the initial consensus validator set.
    #[instrument(skip(self, genesis), fields(chain_id = %genesis.chain_id))]
    pub async fn init_chain(&mut self, genesis: &Genesis) -> Result<Vec<Update>, Report> {
        self.set_chain_id(&genesis.chain_id).await?;
        self.set_params(&genesis.params).await?;
        self.set_block_height(0).await?;

        for GenesisBalance { address, amount } in &genesis.balances {
            self.set_balance(*address, *amount).await?;
        }

        for validator in &genesis.validators {
            self.declare_genesis_candidate(validator).await?;
        }

        for GenesisDelegation {
            delegator,
            candidate,
            amount,
        } in &genesis.delegations
        {
            self.add_delegation(*delegator, *candidate, *amount).await?;
        }

        let updates = self.update_validator_set().await?;
        info!(validators = updates.len(), "initialized chain");
        Ok(updates)
    }

    /// Begin a block, without committing yet.
    pub async fn begin_block(&mut self, height: u64, time: u64) -> Result<(), Report> {
        let current = self.block_height().await?;
        if height != current + 1 {
            bail!("begin-block height {height} does not follow current height {current}");
        }
        self.set_block_height(height).await?;
        self.set_block_time(time).await?;
        Ok(())
    }

    /// Run a request against a throwaway fork of the state, reporting whether it would apply.
    pub async fn check_tx(&self, envelope: &Envelope) -> Result<ExecResult, Report> {
        self.fork().await.deliver_tx(envelope).await
    }

    /// Apply a request to the state, without committing yet.
    ///
    /// A rejected request leaves the state untouched and is reported through the result code;
    /// only failures of the store itself are returned as errors.
    #[instrument(skip(self, envelope), fields(from = %envelope.from, kind = %envelope.tx.kind()))]
    pub async fn deliver_tx(&mut self, envelope: &Envelope) -> Result<ExecResult, Report> {
        let mut fork = self.fork().await;
        match fork.execute(envelope).await {
            Ok(data) => {
                self.store.absorb(fork.store).await;
                debug!("delivered");
                Ok(match data {
                    Some(data) => ExecResult::ok_with_data(&data),
                    None => ExecResult::ok(),
                })
            }
            Err(TxFailure::Rejected(e)) => {
                debug!(%e, "rejected");
                Ok(ExecResult::err(e.code(), e.to_string()))
            }
            Err(TxFailure::Fault(e)) => Err(e),
        }
    }

    async fn execute(
        &mut self,
        Envelope { from, tx, .. }: &Envelope,
    ) -> Result<Option<Vec<u8>>, TxFailure> {
        let fee = self.params().await?.gas_fee(tx);
        let from = *from;
        match tx {
            StakeTx::Declare(declare) => self.declare_candidacy(from, tx, declare, fee).await?,
            StakeTx::Verify(verify) => self.verify_candidacy(from, tx, verify).await?,
            StakeTx::Update(update) => self.update_candidacy(from, tx, update, fee).await?,
            StakeTx::Deactivate => self.deactivate_candidacy(from, tx).await?,
            StakeTx::Activate => self.activate_candidacy(from, tx).await?,
            StakeTx::UpdateAccount(update) => {
                let id = self.update_candidate_account(from, update, fee).await?;
                return Ok(Some(id.to_string().into_bytes()));
            }
            StakeTx::AcceptAccountUpdate(accept) => {
                self.accept_candidate_account_update(from, accept, fee).await?
            }
            StakeTx::Withdraw => self.withdraw_candidacy(from, tx).await?,
        }
        Ok(None)
    }

    /// End a block, returning the changes to the consensus validator set.
    pub async fn end_block(&mut self) -> Result<Vec<Update>, Report> {
        let updates = self.update_validator_set().await?;
        if !updates.is_empty() {
            info!(
                height = self.block_height().await?,
                updates = updates.len(),
                "validator set changed"
            );
        }
        Ok(updates)
    }

    /// Commit all pending changes, returning the committed height.
    pub async fn commit(&mut self) -> Result<u64, Report> {
        let height = self.block_height().await?;
        let version = self.store.commit().await?;
        if version != height {
            bail!("committed version {version} does not match block height {height}");
        }
        Ok(height)
    }
}
