use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cadre_types::{
    Address, ParseError,
    response::{Broadcast, TxResult},
    transaction::{Envelope, StakeTx, TxHash},
    validator::{Description, ValidatorRecord},
};

use crate::poller::{BatchError, Confirmation, PollError, Poller};
use crate::rpc::{Rpc, RpcError};

#[derive(thiserror::Error, Debug)]
pub enum ExecuteError {
    #[error("invalid request: {0}")]
    Invalid(#[from] ParseError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    /// The node accepted the transaction into its mempool but later forgot it.
    #[error("transaction {0} was dropped before inclusion")]
    Dropped(TxHash),
}

impl ExecuteError {
    /// Whether the chain itself has stopped, as opposed to this one request failing.
    pub fn is_fatal(&self) -> bool {
        match self {
            ExecuteError::Poll(e) => e.is_fatal(),
            ExecuteError::Batch(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Submits staking requests and waits for their outcome.
///
/// A request the node refuses, at the mempool or in a block, is not an error: it comes back as a
/// [`TxResult`] with height 0 and the rejection code. Errors are reserved for failing to learn
/// the outcome at all.
pub struct StakeClient<R> {
    rpc: Arc<R>,
    poller: Poller<R>,
    nonce: AtomicU64,
}

impl<R: Rpc> StakeClient<R> {
    pub fn new(rpc: Arc<R>, poller: Poller<R>) -> Self {
        StakeClient {
            rpc,
            poller,
            nonce: AtomicU64::new(0),
        }
    }

    pub fn rpc(&self) -> &Arc<R> {
        &self.rpc
    }

    pub fn poller(&self) -> &Poller<R> {
        &self.poller
    }

    fn envelope(&self, from: Address, tx: StakeTx) -> Envelope {
        Envelope::new(from, self.nonce.fetch_add(1, Ordering::Relaxed), tx)
    }

    /// Hand a request to the node without waiting for it to land.
    pub async fn submit(&self, from: Address, tx: StakeTx) -> Result<Broadcast, ExecuteError> {
        let envelope = self.envelope(from, tx);
        let kind = envelope.tx.kind();
        let broadcast = self.rpc.submit_transaction(envelope).await?;
        debug!(hash = %broadcast.hash, %kind, code = broadcast.check_tx.code, "submitted");
        Ok(broadcast)
    }

    /// Submit a request and wait for its block.
    #[instrument(skip(self, tx), fields(kind = %tx.kind()))]
    pub async fn execute(&self, from: Address, tx: StakeTx) -> Result<TxResult, ExecuteError> {
        let broadcast = self.submit(from, tx).await?;
        if !broadcast.check_tx.is_ok() {
            info!(code = broadcast.check_tx.code, log = %broadcast.check_tx.log, "rejected by mempool");
            return Ok(TxResult::rejected(broadcast));
        }
        match self.poller.wait_for_transaction(broadcast.hash).await? {
            Confirmation::Included(included) => Ok(TxResult::included(broadcast, included)),
            Confirmation::NotFound => Err(ExecuteError::Dropped(broadcast.hash)),
        }
    }

    /// Submit several requests back to back, then wait for all of them together.
    ///
    /// Results come back in submission order.
    pub async fn execute_many(
        &self,
        requests: impl IntoIterator<Item = (Address, StakeTx)>,
    ) -> Result<Vec<TxResult>, ExecuteError> {
        let mut broadcasts = vec![];
        for (from, tx) in requests {
            broadcasts.push(self.submit(from, tx).await?);
        }

        let accepted = broadcasts
            .iter()
            .map(|b| b.check_tx.is_ok().then_some(b.hash));
        let mut confirmations: BTreeMap<TxHash, Confirmation> =
            self.poller.wait_for_any(accepted).await?;

        broadcasts
            .into_iter()
            .map(|broadcast| {
                if !broadcast.check_tx.is_ok() {
                    return Ok(TxResult::rejected(broadcast));
                }
                match confirmations.remove(&broadcast.hash) {
                    Some(Confirmation::Included(included)) => {
                        Ok(TxResult::included(broadcast, included))
                    }
                    Some(Confirmation::NotFound) | None => {
                        Err(ExecuteError::Dropped(broadcast.hash))
                    }
                }
            })
            .collect()
    }

    pub async fn declare_candidacy(
        &self,
        from: Address,
        pub_key: &str,
        description: Description,
    ) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::declare(pub_key, description)?)
            .await
    }

    pub async fn verify_candidacy(
        &self,
        from: Address,
        candidate: Address,
        verified: bool,
    ) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::verify(candidate, verified))
            .await
    }

    /// Change the consensus key, the description, or both. Empty description fields are left
    /// unchanged.
    pub async fn update_candidacy(
        &self,
        from: Address,
        pub_key: Option<&str>,
        description: Description,
    ) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::update(pub_key, description)?)
            .await
    }

    pub async fn deactivate_candidacy(&self, from: Address) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::Deactivate).await
    }

    pub async fn activate_candidacy(&self, from: Address) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::Activate).await
    }

    /// Request moving the candidacy to another account. On success, the result data holds the
    /// request id; see [`TxResult::data_as_u64`].
    pub async fn update_candidate_account(
        &self,
        from: Address,
        new_account: Address,
    ) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::update_account(new_account)?)
            .await
    }

    pub async fn accept_candidate_account_update(
        &self,
        from: Address,
        request_id: u64,
    ) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::accept_account_update(request_id))
            .await
    }

    pub async fn withdraw_candidacy(&self, from: Address) -> Result<TxResult, ExecuteError> {
        self.execute(from, StakeTx::Withdraw).await
    }

    /// The candidate owned by `address` at the latest height.
    pub async fn query_validator(
        &self,
        address: Address,
    ) -> Result<Option<ValidatorRecord>, RpcError> {
        self.rpc.query_validator(address, 0).await
    }

    /// The candidate owned by `address` as of the end of block `height`.
    pub async fn query_validator_at(
        &self,
        address: Address,
        height: u64,
    ) -> Result<Option<ValidatorRecord>, RpcError> {
        self.rpc.query_validator(address, height).await
    }

    pub async fn list_validators(&self) -> Result<Vec<ValidatorRecord>, RpcError> {
        self.rpc.list_validators().await
    }
}
