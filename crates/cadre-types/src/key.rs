//! Consensus public keys.
//!
//! Validators are identified to the consensus layer by Ed25519 keys. Requests carry them as
//! base64, records serialize them the way CometBFT does
//! (`{"type": "tendermint/PubKeyEd25519", "value": "<base64>"}`).

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

pub use tendermint::PublicKey;

use crate::ParseError;

/// Parse a base64-encoded raw Ed25519 public key.
pub fn parse_pub_key(encoded: &str) -> Result<PublicKey, ParseError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| ParseError::of::<PublicKey>())?;
    PublicKey::from_raw_ed25519(&bytes).ok_or_else(ParseError::of::<PublicKey>)
}

/// Base64 encoding of the raw key bytes, the inverse of [`parse_pub_key`].
pub fn encode_pub_key(pub_key: &PublicKey) -> String {
    STANDARD.encode(pub_key.to_bytes())
}

/// Hex encoding of the raw key bytes, used as a stable map and storage key.
pub fn key_id(pub_key: &PublicKey) -> String {
    hex::encode(pub_key.to_bytes())
}

/// The consensus address of a key: the first 20 bytes of the SHA-256 of the key.
pub fn consensus_address(pub_key: &PublicKey) -> [u8; 20] {
    let mut context = Sha256::new();
    context.update(pub_key.to_bytes());
    let hash: [u8; 32] = context.finalize().into();
    let mut address = [0; 20];
    address.copy_from_slice(&hash[0..20]);
    address
}
