use cadre_types::{
    Address,
    response::{Broadcast, ConsensusValidators, TxStatus},
    transaction::{Envelope, TxHash},
    validator::ValidatorRecord,
};

/// The node a client talks to.
///
/// Every method is a single request: a failure means that one request failed, and says nothing
/// about whether the chain is still live.
pub trait Rpc: Send + Sync + 'static {
    /// Hand a transaction to the node's mempool, returning its hash and the mempool verdict.
    fn submit_transaction(
        &self,
        envelope: Envelope,
    ) -> impl Future<Output = Result<Broadcast, RpcError>> + Send;

    fn transaction_status(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<TxStatus, RpcError>> + Send;

    /// Height of the latest committed block.
    fn current_block_height(&self) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// The candidate owned by `address` as of the end of block `height`, or latest if 0.
    fn query_validator(
        &self,
        address: Address,
        height: u64,
    ) -> impl Future<Output = Result<Option<ValidatorRecord>, RpcError>> + Send;

    /// Every registered candidate, in order of declaration.
    fn list_validators(&self)
    -> impl Future<Output = Result<Vec<ValidatorRecord>, RpcError>> + Send;

    fn balance(&self, address: Address) -> impl Future<Output = Result<u128, RpcError>> + Send;

    /// The validator set the consensus layer is currently running with.
    fn consensus_validators(
        &self,
    ) -> impl Future<Output = Result<ConsensusValidators, RpcError>> + Send;
}

#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    /// The node has pruned, or not yet reached, the requested height.
    #[error("height {0} is not available")]
    HeightUnavailable(u64),
    /// The node is up but refuses to serve requests.
    #[error("node unavailable")]
    Unavailable,
    #[error("node error: {0}")]
    Node(String),
}
