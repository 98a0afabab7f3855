use std::collections::BTreeMap;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use cadre_client::{Rpc, RpcError};
use cadre_state::{StakeError, State, Store};
use cadre_types::{
    Address,
    response::{Broadcast, ConsensusValidators, ExecResult, Included, TxStatus},
    transaction::{Envelope, TxHash},
    validator::ValidatorRecord,
};
use color_eyre::Report;
use tempfile::TempDir;
use tendermint::validator::Update;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use crate::config::DevnetConfig;
use crate::consensus::ConsensusLayer;

/// A single-node chain producing blocks on a timer.
///
/// The block producer task is the only writer of committed state. Submitted transactions are
/// checked against a fork of the latest state, which accumulates every accepted transaction
/// until the next block is committed.
pub struct Devnet {
    node: Arc<Node>,
    producer: AbortHandle,
}

struct Node {
    config: DevnetConfig,
    halted: AtomicBool,
    chain: RwLock<Chain>,
    _storage: TempDir,
}

struct Chain {
    height: u64,
    state: State,
    check: State,
    mempool: Vec<(TxHash, Envelope)>,
    results: BTreeMap<TxHash, Included>,
    consensus: ConsensusLayer,
}

impl Devnet {
    /// Initialize the chain from the configured genesis and start producing blocks.
    #[instrument(skip(config), fields(chain_id = %config.genesis.chain_id))]
    pub async fn start(config: DevnetConfig) -> Result<Self, Report> {
        let storage = tempfile::Builder::new().prefix("cadre-devnet").tempdir()?;
        let chain = Chain::genesis(&config, storage.path().to_path_buf()).await?;

        let node = Arc::new(Node {
            halted: AtomicBool::new(false),
            chain: RwLock::new(chain),
            config,
            _storage: storage,
        });

        let producer = tokio::spawn(node.clone().produce()).abort_handle();
        info!(interval = ?node.config.block_interval, "devnet started");
        Ok(Devnet { node, producer })
    }

    pub fn config(&self) -> &DevnetConfig {
        &self.node.config
    }

    /// Stop producing blocks. Transactions are still accepted into the mempool.
    pub fn halt(&self) {
        warn!("halting block production");
        self.node.halted.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        info!("resuming block production");
        self.node.halted.store(false, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.node.halted.load(Ordering::SeqCst)
    }

    /// Stop the block producer for good.
    pub fn shutdown(&self) {
        self.producer.abort();
    }
}

impl Drop for Devnet {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

impl Node {
    async fn produce(self: Arc<Self>) {
        let mut ticks = tokio::time::interval(self.config.block_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes at once; the first block comes one interval after genesis.
        ticks.tick().await;

        loop {
            ticks.tick().await;
            if self.halted.load(Ordering::SeqCst) {
                continue;
            }
            if let Err(e) = self.produce_block().await {
                error!(%e, "block production failed; halting");
                self.halted.store(true, Ordering::SeqCst);
            }
        }
    }

    async fn produce_block(&self) -> Result<u64, Report> {
        self.chain
            .write()
            .await
            .produce_block(unix_time(), self.config.retain_results)
            .await
    }

    /// Read access to the state as of `height`, or the latest state if `height` is 0.
    async fn state_at(&self, chain: &Chain, height: u64) -> Result<Option<State>, RpcError> {
        if height == 0 {
            return Ok(None);
        }
        match chain.state.at_height(height) {
            Some(state) => Ok(Some(state)),
            None => Err(RpcError::HeightUnavailable(height)),
        }
    }
}

impl Chain {
    async fn genesis(config: &DevnetConfig, path: PathBuf) -> Result<Self, Report> {
        let mut state = State::new(Store::init(path).await?);
        let updates = state.init_chain(&config.genesis).await?;
        let height = state.commit().await?;
        let check = state.fork().await;
        Ok(Chain {
            height,
            state,
            check,
            mempool: vec![],
            results: BTreeMap::new(),
            consensus: ConsensusLayer::genesis(config.validator_update_delay, updates),
        })
    }

    /// Run the mempool as the next block and commit it.
    ///
    /// The block is executed on a fork, so a failure leaves the state at the last committed
    /// height and puts every transaction of the block back into the mempool.
    async fn produce_block(&mut self, time: u64, retain_results: u64) -> Result<u64, Report> {
        let height = self.height + 1;
        let txs = mem::take(&mut self.mempool);

        let mut block = self.state.fork().await;
        let (included, updates) = match execute_block(&mut block, height, time, &txs).await {
            Ok(executed) => executed,
            Err(e) => {
                self.mempool = txs;
                return Err(e);
            }
        };
        self.state.absorb(block).await;

        // A commit consumes the snapshot the check fork reads from, failed or not.
        let committed = self.state.commit().await;
        self.check = self.state.fork().await;
        if let Err(e) = committed {
            self.mempool = txs;
            return Err(e);
        }

        self.height = height;
        self.results.extend(included);
        self.results
            .retain(|_, included| included.height + retain_results > height);
        self.consensus.advance(height, updates);

        debug!(height, txs = txs.len(), "committed block");
        Ok(height)
    }
}

async fn execute_block(
    state: &mut State,
    height: u64,
    time: u64,
    txs: &[(TxHash, Envelope)],
) -> Result<(Vec<(TxHash, Included)>, Vec<Update>), Report> {
    state.begin_block(height, time).await?;
    let mut included = Vec::with_capacity(txs.len());
    for (hash, envelope) in txs {
        let deliver_tx = state.deliver_tx(envelope).await?;
        included.push((*hash, Included { height, deliver_tx }));
    }
    let updates = state.end_block().await?;
    Ok((included, updates))
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn node_error(e: Report) -> RpcError {
    RpcError::Node(format!("{e:#}"))
}

impl Rpc for Devnet {
    #[instrument(skip_all, fields(from = %envelope.from, kind = %envelope.tx.kind()))]
    async fn submit_transaction(&self, envelope: Envelope) -> Result<Broadcast, RpcError> {
        let hash = envelope.hash();
        let mut chain = self.node.chain.write().await;

        let known = chain.results.contains_key(&hash)
            || chain.mempool.iter().any(|(pending, _)| *pending == hash);
        if known {
            let e = StakeError::Duplicate;
            return Ok(Broadcast {
                hash,
                check_tx: ExecResult::err(e.code(), e.to_string()),
            });
        }

        let check_tx = chain.check.deliver_tx(&envelope).await.map_err(node_error)?;
        if check_tx.is_ok() {
            chain.mempool.push((hash, envelope));
        } else {
            debug!(code = check_tx.code, log = %check_tx.log, "check failed");
        }
        Ok(Broadcast { hash, check_tx })
    }

    async fn transaction_status(&self, hash: TxHash) -> Result<TxStatus, RpcError> {
        let chain = self.node.chain.read().await;
        if let Some(included) = chain.results.get(&hash) {
            return Ok(TxStatus::Included(included.clone()));
        }
        if chain.mempool.iter().any(|(pending, _)| *pending == hash) {
            return Ok(TxStatus::Pending);
        }
        Ok(TxStatus::NotFound)
    }

    async fn current_block_height(&self) -> Result<u64, RpcError> {
        Ok(self.node.chain.read().await.height)
    }

    async fn query_validator(
        &self,
        address: Address,
        height: u64,
    ) -> Result<Option<ValidatorRecord>, RpcError> {
        let chain = self.node.chain.read().await;
        let record = match self.node.state_at(&chain, height).await? {
            Some(past) => past.candidate(address).await,
            None => chain.state.candidate(address).await,
        }
        .map_err(node_error)?;

        Ok(record.map(|mut record| {
            record.tendermint_voting_power = chain.consensus.power_of(&record.pub_key);
            record
        }))
    }

    async fn list_validators(&self) -> Result<Vec<ValidatorRecord>, RpcError> {
        let chain = self.node.chain.read().await;
        let mut records = chain.state.candidates().await.map_err(node_error)?;
        for record in &mut records {
            record.tendermint_voting_power = chain.consensus.power_of(&record.pub_key);
        }
        Ok(records)
    }

    async fn balance(&self, address: Address) -> Result<u128, RpcError> {
        let chain = self.node.chain.read().await;
        chain.state.balance(address).await.map_err(node_error)
    }

    async fn consensus_validators(&self) -> Result<ConsensusValidators, RpcError> {
        Ok(self.node.chain.read().await.consensus.validators())
    }
}
