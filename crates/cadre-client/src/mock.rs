//! A scripted node for exercising the client against tokio's paused clock.
//!
//! Height advances by one every `block_time` of (virtual) elapsed time unless halted.
//! Transactions are scripted to land at a given height, or land two blocks after submission.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use cadre_types::{
    Address,
    response::{Broadcast, ConsensusValidators, ExecResult, Included, TxStatus, ValidatorSet},
    transaction::{Envelope, TxHash},
    validator::ValidatorRecord,
};
use tokio::time::Instant;

use crate::rpc::{Rpc, RpcError};

pub struct MockChain {
    started: Instant,
    block_time: Duration,
    offset: AtomicU64,
    halted_at: Mutex<Option<u64>>,
    failures: AtomicU64,
    unresponsive: AtomicBool,
    reject_next: Mutex<Option<ExecResult>>,
    inclusions: Mutex<BTreeMap<TxHash, (u64, ExecResult)>>,
    submitted: Mutex<Vec<Envelope>>,
}

impl MockChain {
    pub fn new(block_time: Duration) -> Arc<Self> {
        Arc::new(MockChain {
            started: Instant::now(),
            block_time,
            offset: AtomicU64::new(0),
            halted_at: Mutex::new(None),
            failures: AtomicU64::new(0),
            unresponsive: AtomicBool::new(false),
            reject_next: Mutex::new(None),
            inclusions: Mutex::new(BTreeMap::new()),
            submitted: Mutex::new(vec![]),
        })
    }

    pub fn height(&self) -> u64 {
        if let Some(height) = *self.halted_at.lock().unwrap() {
            return height;
        }
        let blocks = self.started.elapsed().as_millis() / self.block_time.as_millis();
        blocks as u64 + self.offset.load(Ordering::SeqCst)
    }

    /// Jump forward so that the current height is `height`.
    pub fn advance_to(&self, height: u64) {
        let current = self.height();
        self.offset
            .fetch_add(height.saturating_sub(current), Ordering::SeqCst);
    }

    /// Stop producing blocks.
    pub fn halt(&self) {
        let height = self.height();
        *self.halted_at.lock().unwrap() = Some(height);
    }

    /// Fail the next `n` height requests.
    pub fn fail_next(&self, n: u64) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Leave every later status request unanswered.
    pub fn stop_answering(&self) {
        self.unresponsive.store(true, Ordering::SeqCst);
    }

    /// Have the mempool turn away the next submission with `result`.
    pub fn reject_next(&self, result: ExecResult) {
        *self.reject_next.lock().unwrap() = Some(result);
    }

    pub fn include_at(&self, hash: TxHash, height: u64, result: ExecResult) {
        self.inclusions
            .lock()
            .unwrap()
            .insert(hash, (height, result));
    }

    pub fn submitted(&self) -> Vec<Envelope> {
        self.submitted.lock().unwrap().clone()
    }
}

impl Rpc for MockChain {
    async fn submit_transaction(&self, envelope: Envelope) -> Result<Broadcast, RpcError> {
        let hash = envelope.hash();
        self.submitted.lock().unwrap().push(envelope);
        if let Some(check_tx) = self.reject_next.lock().unwrap().take() {
            return Ok(Broadcast { hash, check_tx });
        }
        let mut inclusions = self.inclusions.lock().unwrap();
        if !inclusions.contains_key(&hash) {
            inclusions.insert(hash, (self.height() + 2, ExecResult::ok()));
        }
        Ok(Broadcast {
            hash,
            check_tx: ExecResult::ok(),
        })
    }

    async fn transaction_status(&self, hash: TxHash) -> Result<TxStatus, RpcError> {
        if self.unresponsive.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let height = self.height();
        Ok(match self.inclusions.lock().unwrap().get(&hash) {
            Some((at, deliver_tx)) if *at <= height => TxStatus::Included(Included {
                height: *at,
                deliver_tx: deliver_tx.clone(),
            }),
            Some(_) => TxStatus::Pending,
            None => TxStatus::NotFound,
        })
    }

    async fn current_block_height(&self) -> Result<u64, RpcError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(RpcError::Unavailable);
        }
        Ok(self.height())
    }

    async fn query_validator(
        &self,
        _address: Address,
        height: u64,
    ) -> Result<Option<ValidatorRecord>, RpcError> {
        if height > self.height() {
            return Err(RpcError::HeightUnavailable(height));
        }
        Ok(None)
    }

    async fn list_validators(&self) -> Result<Vec<ValidatorRecord>, RpcError> {
        Ok(vec![])
    }

    async fn balance(&self, _address: Address) -> Result<u128, RpcError> {
        Ok(0)
    }

    async fn consensus_validators(&self) -> Result<ConsensusValidators, RpcError> {
        Ok(ConsensusValidators {
            result: ValidatorSet {
                block_height: self.height(),
                validators: vec![],
            },
        })
    }
}
