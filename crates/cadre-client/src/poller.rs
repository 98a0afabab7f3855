//! Waiting for the chain to make progress.
//!
//! The only things a node lets us observe are its height and the status of a transaction, so
//! waiting is polling: sample at a fixed interval until the outcome shows up. Two budgets bound
//! every wait. The block budget catches a transaction that stays pending while blocks keep
//! coming; the wall-clock budget catches a chain that stopped producing blocks at all, in which
//! case no block budget would ever run out.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use cadre_types::response::{Included, TxStatus};
use cadre_types::transaction::TxHash;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::rpc::{Rpc, RpcError};

/// Budgets for a single wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Blocks that may pass without the awaited outcome before giving up.
    pub blocks: u64,
    /// Wall-clock time after which the chain is considered stuck.
    pub wall: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            blocks: 10,
            wall: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Time between two samples.
    pub interval: Duration,
    pub timeouts: Timeouts,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_millis(100),
            timeouts: Timeouts::default(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// The block budget ran out while blocks were still being produced.
    #[error("no outcome after {blocks} blocks")]
    BlockTimeout { blocks: u64 },
    /// The wall-clock budget ran out: the chain is not making progress.
    #[error("no outcome within {wall:?}; last observed height {height:?}")]
    Stalled { wall: Duration, height: Option<u64> },
    #[error("poll was cancelled")]
    Cancelled,
}

impl PollError {
    /// Whether the error means the environment itself is broken, so that nothing else waiting
    /// on the same chain can succeed either.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PollError::Stalled { .. })
    }
}

/// How a transaction's wait ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Included(Included),
    /// The node does not know the transaction, and a block has passed since the wait began.
    NotFound,
}

/// The outcome of [`Poller::wait_for_any`] when at least one poll failed. Every outcome is kept,
/// successful or not.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{} of {} polls failed", self.failures().count(), self.outcomes.len())]
pub struct BatchError {
    pub outcomes: BTreeMap<TxHash, Result<Confirmation, PollError>>,
}

impl BatchError {
    pub fn failures(&self) -> impl Iterator<Item = (&TxHash, &PollError)> {
        self.outcomes
            .iter()
            .filter_map(|(hash, outcome)| outcome.as_ref().err().map(|e| (hash, e)))
    }

    pub fn is_fatal(&self) -> bool {
        self.failures().any(|(_, e)| e.is_fatal())
    }
}

/// A poll running in the background.
///
/// The task reports its single outcome over a oneshot channel. Dropping the handle cancels the
/// task.
#[derive(Debug)]
pub struct PollHandle<T> {
    outcome: Option<oneshot::Receiver<Result<T, PollError>>>,
    task: AbortHandle,
}

impl<T: Send + 'static> PollHandle<T> {
    fn spawn(poll: impl Future<Output = Result<T, PollError>> + Send + 'static) -> Self {
        let (sender, outcome) = oneshot::channel();
        let task = tokio::spawn(async move {
            // The receiver may be gone already; nobody is left to tell.
            let _ = sender.send(poll.await);
        });
        PollHandle {
            outcome: Some(outcome),
            task: task.abort_handle(),
        }
    }
}

impl<T> PollHandle<T> {
    /// Wait for the poll to finish.
    pub async fn wait(mut self) -> Result<T, PollError> {
        match self.outcome.take() {
            Some(outcome) => outcome.await.unwrap_or(Err(PollError::Cancelled)),
            None => Err(PollError::Cancelled),
        }
    }

    /// Wait at most `limit` for the poll to finish, leaving it running if it does not.
    ///
    /// Once this has returned an outcome the handle is spent, and further waits report
    /// [`PollError::Cancelled`].
    pub async fn wait_timeout(&mut self, limit: Duration) -> Option<Result<T, PollError>> {
        let Some(outcome) = self.outcome.as_mut() else {
            return Some(Err(PollError::Cancelled));
        };
        let received = tokio::time::timeout(limit, outcome).await.ok()?;
        self.outcome = None;
        Some(received.unwrap_or(Err(PollError::Cancelled)))
    }

    /// Stop the poll.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Heights seen by a running poll.
#[derive(Clone, Copy, Debug)]
struct Progress {
    start: u64,
    height: u64,
}

impl Progress {
    fn blocks_gone(self) -> u64 {
        self.height.saturating_sub(self.start)
    }
}

/// Polls a node for block progress and transaction inclusion.
pub struct Poller<R> {
    rpc: Arc<R>,
    config: PollConfig,
}

impl<R> Clone for Poller<R> {
    fn clone(&self) -> Self {
        Poller {
            rpc: self.rpc.clone(),
            config: self.config,
        }
    }
}

impl<R: Rpc> Poller<R> {
    pub fn new(rpc: Arc<R>, config: PollConfig) -> Self {
        Poller { rpc, config }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// A poller on the same node with different budgets.
    pub fn with_timeouts(&self, timeouts: Timeouts) -> Self {
        Poller {
            rpc: self.rpc.clone(),
            config: PollConfig {
                timeouts,
                ..self.config
            },
        }
    }

    /// A poller on the same node sampling at a different interval.
    pub fn with_interval(&self, interval: Duration) -> Self {
        Poller {
            rpc: self.rpc.clone(),
            config: PollConfig {
                interval,
                ..self.config
            },
        }
    }

    /// Wait until the chain is `delta` blocks past the height it was at when the call began,
    /// returning the height reached.
    #[instrument(skip(self))]
    pub async fn wait_for_blocks(&self, delta: u64) -> Result<u64, PollError> {
        let height = self
            .poll_until(|progress| async move {
                Ok((progress.blocks_gone() >= delta).then_some(progress.height))
            })
            .await?;
        debug!(height, "reached");
        Ok(height)
    }

    /// Wait until the transaction is included in a block, or until the node has forgotten it.
    ///
    /// A node reports a transaction it never accepted as unknown, but so may a node that has not
    /// yet gossiped it into its mempool. `NotFound` is therefore only final once at least one
    /// block has passed since the wait began.
    #[instrument(skip(self))]
    pub async fn wait_for_transaction(&self, hash: TxHash) -> Result<Confirmation, PollError> {
        let rpc = self.rpc.clone();
        let confirmation = self
            .poll_until(move |progress| {
                let rpc = rpc.clone();
                async move {
                    Ok(match rpc.transaction_status(hash).await? {
                        TxStatus::Included(included) => Some(Confirmation::Included(included)),
                        TxStatus::NotFound if progress.blocks_gone() > 0 => {
                            Some(Confirmation::NotFound)
                        }
                        TxStatus::NotFound | TxStatus::Pending => {
                            trace!(blocks_gone = progress.blocks_gone(), "pending");
                            None
                        }
                    })
                }
            })
            .await?;
        debug!(?confirmation, "confirmed");
        Ok(confirmation)
    }

    /// Run [`Poller::wait_for_blocks`] in the background.
    pub fn spawn_wait_for_blocks(&self, delta: u64) -> PollHandle<u64> {
        let poller = self.clone();
        PollHandle::spawn(async move { poller.wait_for_blocks(delta).await })
    }

    /// Run [`Poller::wait_for_transaction`] in the background.
    pub fn spawn_wait_for_transaction(&self, hash: TxHash) -> PollHandle<Confirmation> {
        let poller = self.clone();
        PollHandle::spawn(async move { poller.wait_for_transaction(hash).await })
    }

    /// Wait for several transactions at once, one independent poll each.
    ///
    /// Absent hashes are skipped. Every poll runs to its own end even if another fails, and
    /// all outcomes are reported together: as a map if all succeeded, else inside the error.
    pub async fn wait_for_any(
        &self,
        hashes: impl IntoIterator<Item = Option<TxHash>>,
    ) -> Result<BTreeMap<TxHash, Confirmation>, BatchError> {
        let hashes: BTreeSet<TxHash> = hashes.into_iter().flatten().collect();
        let polls = hashes.into_iter().map(|hash| {
            let handle = self.spawn_wait_for_transaction(hash);
            async move { (hash, handle.wait().await) }
        });
        let outcomes: BTreeMap<_, _> = join_all(polls).await.into_iter().collect();

        if outcomes.values().any(Result::is_err) {
            let error = BatchError { outcomes };
            warn!(%error, fatal = error.is_fatal(), "batch wait failed");
            return Err(error);
        }
        Ok(outcomes
            .into_iter()
            .filter_map(|(hash, outcome)| outcome.ok().map(|c| (hash, c)))
            .collect())
    }

    /// Sample the chain every interval until `probe` yields a value or a budget runs out.
    ///
    /// Failed requests are logged and retried on the next tick; only the budgets end a poll.
    /// The wall-clock budget also cuts short a request the node never answers.
    async fn poll_until<T, F, Fut>(&self, mut probe: F) -> Result<T, PollError>
    where
        F: FnMut(Progress) -> Fut,
        Fut: Future<Output = Result<Option<T>, RpcError>>,
    {
        let wall = self.config.timeouts.wall;
        let mut last_height = None;
        let sampled = tokio::time::timeout_at(
            Instant::now() + wall,
            self.sample(&mut probe, &mut last_height),
        )
        .await;

        sampled.unwrap_or_else(|_| {
            error!(?wall, height = ?last_height, "chain is not making progress");
            Err(PollError::Stalled {
                wall,
                height: last_height,
            })
        })
    }

    async fn sample<T, F, Fut>(
        &self,
        probe: &mut F,
        last_height: &mut Option<u64>,
    ) -> Result<T, PollError>
    where
        F: FnMut(Progress) -> Fut,
        Fut: Future<Output = Result<Option<T>, RpcError>>,
    {
        let PollConfig {
            interval,
            timeouts: Timeouts { blocks, .. },
        } = self.config;
        let mut ticks = tokio::time::interval(interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut start = None;
        loop {
            ticks.tick().await;

            let height = match self.rpc.current_block_height().await {
                Ok(height) => height,
                Err(e) => {
                    warn!(%e, "failed to read block height; retrying");
                    continue;
                }
            };
            *last_height = Some(height);
            let progress = Progress {
                start: *start.get_or_insert(height),
                height,
            };
            match probe(progress).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => warn!(%e, "poll request failed; retrying"),
            }
            if progress.blocks_gone() > blocks {
                return Err(PollError::BlockTimeout { blocks });
            }
        }
    }
}
