//! Shapes in which a node reports transactions and validator sets back to callers.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::transaction::TxHash;
use crate::{ParseError, PublicKey};

/// Result of running a transaction through the mempool check or through block execution.
///
/// A zero `code` means success; any other code names the rejection reason.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub code: u32,
    /// Base64-encoded return data.
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub log: String,
}

impl ExecResult {
    pub fn ok() -> Self {
        ExecResult::default()
    }

    pub fn ok_with_data(data: &[u8]) -> Self {
        ExecResult {
            data: STANDARD.encode(data),
            ..Default::default()
        }
    }

    pub fn err(code: u32, log: impl Into<String>) -> Self {
        ExecResult {
            code,
            data: String::new(),
            log: log.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    pub fn data_bytes(&self) -> Result<Vec<u8>, ParseError> {
        STANDARD
            .decode(&self.data)
            .map_err(|_| ParseError::of::<ExecResult>())
    }
}

/// Acknowledgement of a submission: the handle to poll, and the mempool verdict.
///
/// If `check_tx` failed, the transaction never entered the mempool and the node will report
/// its hash as unknown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    pub hash: TxHash,
    pub check_tx: ExecResult,
}

/// Inclusion of a transaction in a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Included {
    pub height: u64,
    pub deliver_tx: ExecResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Included(Included),
    NotFound,
}

/// The final result of a transaction as surfaced to callers.
///
/// `height == 0` signals rejection; inspect `check_tx.code` or `deliver_tx.code` for the
/// reason. `height > 0` is the block the transaction succeeded in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub hash: TxHash,
    pub height: u64,
    pub check_tx: ExecResult,
    pub deliver_tx: ExecResult,
}

impl TxResult {
    /// A transaction turned away by the mempool.
    pub fn rejected(broadcast: Broadcast) -> Self {
        TxResult {
            hash: broadcast.hash,
            height: 0,
            check_tx: broadcast.check_tx,
            deliver_tx: ExecResult::ok(),
        }
    }

    /// A transaction that made it into a block, successfully or not.
    pub fn included(broadcast: Broadcast, included: Included) -> Self {
        let height = if included.deliver_tx.is_ok() {
            included.height
        } else {
            0
        };
        TxResult {
            hash: broadcast.hash,
            height,
            check_tx: broadcast.check_tx,
            deliver_tx: included.deliver_tx,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.height > 0
    }

    /// The non-zero rejection code, if the transaction failed.
    pub fn error_code(&self) -> Option<u32> {
        if !self.check_tx.is_ok() {
            Some(self.check_tx.code)
        } else if !self.deliver_tx.is_ok() {
            Some(self.deliver_tx.code)
        } else {
            None
        }
    }

    /// Interpret the delivery data as a decimal integer, as returned by `update_account`.
    pub fn data_as_u64(&self) -> Result<u64, ParseError> {
        let bytes = self.deliver_tx.data_bytes()?;
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(ParseError::of::<u64>)
    }
}

/// The consensus layer's validator set, in the shape CometBFT's `/validators` returns it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusValidators {
    pub result: ValidatorSet,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    #[serde(with = "quoted")]
    pub block_height: u64,
    pub validators: Vec<ConsensusValidator>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusValidator {
    pub pub_key: PublicKey,
    #[serde(with = "quoted")]
    pub voting_power: u64,
}

impl ConsensusValidators {
    pub fn validators(&self) -> &[ConsensusValidator] {
        &self.result.validators
    }

    pub fn power_of(&self, pub_key: &PublicKey) -> Option<u64> {
        self.validators()
            .iter()
            .find(|v| &v.pub_key == pub_key)
            .map(|v| v.voting_power)
    }
}

/// Integers carried as decimal strings, as CometBFT does for 64-bit values.
mod quoted {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Quoted {
            Number(u64),
            String(String),
        }
        match Quoted::deserialize(deserializer)? {
            Quoted::Number(n) => Ok(n),
            Quoted::String(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
