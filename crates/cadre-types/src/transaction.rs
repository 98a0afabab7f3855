use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::key::parse_pub_key;
use crate::validator::Description;
use crate::{Address, ParseError, PublicKey};

/// A staking request.
///
/// This is the closed set of operations the validator registry accepts. Each variant carries
/// only the fields it needs; the sender is carried by the [`Envelope`], not the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StakeTx {
    Declare(Declare),
    Verify(Verify),
    Update(Update),
    Deactivate,
    Activate,
    UpdateAccount(UpdateAccount),
    AcceptAccountUpdate(AcceptAccountUpdate),
    Withdraw,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declare {
    pub pub_key: PublicKey,
    #[serde(default)]
    pub description: Description,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verify {
    pub candidate_address: Address,
    pub verified: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub pub_key: Option<PublicKey>,
    #[serde(default)]
    pub description: Description,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccount {
    pub new_candidate_account: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptAccountUpdate {
    pub account_update_request_id: u64,
}

/// The kind of a [`StakeTx`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TxKind {
    Declare,
    Verify,
    Update,
    Deactivate,
    Activate,
    UpdateAccount,
    AcceptAccountUpdate,
    Withdraw,
}

impl TxKind {
    /// The routing name of the operation, e.g. `stake/declareCandidacy`.
    pub fn name(self) -> &'static str {
        match self {
            TxKind::Declare => "stake/declareCandidacy",
            TxKind::Verify => "stake/verifyCandidacy",
            TxKind::Update => "stake/updateCandidacy",
            TxKind::Deactivate => "stake/deactivateCandidacy",
            TxKind::Activate => "stake/activateCandidacy",
            TxKind::UpdateAccount => "stake/updateCandidacyAccount",
            TxKind::AcceptAccountUpdate => "stake/acceptCandidacyAccountUpdate",
            TxKind::Withdraw => "stake/withdrawCandidacy",
        }
    }
}

impl Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StakeTx {
    /// Declare candidacy with a base64-encoded Ed25519 consensus key.
    pub fn declare(pub_key: &str, description: Description) -> Result<Self, ParseError> {
        Ok(StakeTx::Declare(Declare {
            pub_key: parse_pub_key(pub_key)?,
            description,
        }))
    }

    /// Set the verified flag of a candidate. Only the foundation account may do this.
    pub fn verify(candidate_address: Address, verified: bool) -> Self {
        StakeTx::Verify(Verify {
            candidate_address,
            verified,
        })
    }

    /// Replace the consensus key and/or description. Empty fields are left unchanged.
    pub fn update(pub_key: Option<&str>, description: Description) -> Result<Self, ParseError> {
        let pub_key = pub_key
            .filter(|k| !k.trim().is_empty())
            .map(parse_pub_key)
            .transpose()?;
        Ok(StakeTx::Update(Update {
            pub_key,
            description,
        }))
    }

    /// Ask to move the candidacy to another account.
    pub fn update_account(new_candidate_account: Address) -> Result<Self, ParseError> {
        if new_candidate_account.is_zero() {
            return Err(ParseError::of::<UpdateAccount>());
        }
        Ok(StakeTx::UpdateAccount(UpdateAccount {
            new_candidate_account,
        }))
    }

    /// Accept a pending account update; must be sent from the update's target account.
    pub fn accept_account_update(account_update_request_id: u64) -> Self {
        StakeTx::AcceptAccountUpdate(AcceptAccountUpdate {
            account_update_request_id,
        })
    }

    pub fn kind(&self) -> TxKind {
        match self {
            StakeTx::Declare(_) => TxKind::Declare,
            StakeTx::Verify(_) => TxKind::Verify,
            StakeTx::Update(_) => TxKind::Update,
            StakeTx::Deactivate => TxKind::Deactivate,
            StakeTx::Activate => TxKind::Activate,
            StakeTx::UpdateAccount(_) => TxKind::UpdateAccount,
            StakeTx::AcceptAccountUpdate(_) => TxKind::AcceptAccountUpdate,
            StakeTx::Withdraw => TxKind::Withdraw,
        }
    }
}

/// A staking request together with the account it is sent from.
///
/// Signing is the job of the account's key manager; by the time a request reaches the node
/// the sender is taken as authenticated. The nonce only serves to make otherwise identical
/// requests hash differently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Address,
    pub nonce: u64,
    pub tx: StakeTx,
}

impl Envelope {
    pub fn new(from: Address, nonce: u64, tx: StakeTx) -> Self {
        Envelope { from, nonce, tx }
    }

    /// The SHA-256 of the canonical JSON encoding of the envelope.
    pub fn hash(&self) -> TxHash {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let mut context = Sha256::new();
        context.update(&encoded);
        TxHash(context.finalize().into())
    }
}

/// Handle identifying a submitted transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHash(pub [u8; 32]);

impl FromStr for TxHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches("0x");
        let bytes = hex::decode(digits).map_err(|_| ParseError::of::<TxHash>())?;
        Ok(TxHash(
            bytes.try_into().map_err(|_| ParseError::of::<TxHash>())?,
        ))
    }
}

impl Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const KEY: &str = "LY3sRPcr63CE9uIJivApXlcYXKUoidtD+64mIljrYxk=";

    #[test]
    fn construction_validates_fields() {
        assert!(StakeTx::declare("garbage", Description::default()).is_err());
        assert!(StakeTx::update_account(Address::ZERO).is_err());
        assert_eq!(
            StakeTx::update(Some("  "), Description::default()).unwrap(),
            StakeTx::Update(Update {
                pub_key: None,
                description: Description::default(),
            })
        );
    }

    #[test]
    fn request_json_is_tagged_by_type() {
        let tx = StakeTx::declare(KEY, Description::default()).unwrap();
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "declare");
        assert_eq!(json["pub_key"]["value"], KEY);

        let json = serde_json::to_value(StakeTx::Withdraw).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "withdraw" }));
    }

    #[test]
    fn nonce_distinguishes_identical_requests() {
        let from = Address::new([7; 20]);
        let a = Envelope::new(from, 0, StakeTx::Activate);
        let b = Envelope::new(from, 1, StakeTx::Activate);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.clone().hash());
    }

    #[test]
    fn hash_string_round_trip() {
        let hash = Envelope::new(Address::ZERO, 3, StakeTx::Withdraw).hash();
        assert_eq!(hash.to_string().parse::<TxHash>().unwrap(), hash);
    }
}
