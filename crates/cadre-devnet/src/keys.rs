//! Deterministic accounts and keys for a development chain.
//!
//! Nothing here is secret: every key is derived from a one-byte seed, so a devnet is
//! reproducible from its configuration alone.

use cadre_state::{Genesis, GenesisBalance, GenesisDelegation, GenesisValidator};
use cadre_types::key::consensus_address;
use cadre_types::validator::Description;
use cadre_types::{Address, Params, PublicKey};
use ed25519_dalek::SigningKey;

/// Seed of the key owned by the single genesis validator.
pub const GENESIS_SEED: u8 = 0;

/// Balance given to every funded devnet account.
pub const DEV_BALANCE: u128 = 1_000_000_000_000_000_000_000;

/// The consensus public key derived from `seed`.
pub fn dev_key(seed: u8) -> PublicKey {
    let signing = SigningKey::from_bytes(&[seed; 32]);
    // An Ed25519 verifying key is always 32 bytes, which is all `from_raw_ed25519` checks.
    match PublicKey::from_raw_ed25519(signing.verifying_key().as_bytes()) {
        Some(key) => key,
        None => unreachable!("ed25519 verifying keys are 32 bytes"),
    }
}

/// The account owning `dev_key(seed)`.
pub fn dev_address(seed: u8) -> Address {
    Address::new(consensus_address(&dev_key(seed)))
}

/// A genesis with one validator and `accounts` funded accounts, seeded `1..=accounts`.
///
/// The second funded account also delegates to the genesis validator, so that it is taken as a
/// delegator by the account update rules.
pub fn dev_genesis(chain_id: &str, params: Params, accounts: u8) -> Genesis {
    let owner = dev_address(GENESIS_SEED);
    let funded = [owner, params.foundation_address]
        .into_iter()
        .chain((1..=accounts).map(dev_address));

    Genesis {
        chain_id: chain_id.to_string(),
        validators: vec![GenesisValidator {
            owner_address: owner,
            pub_key: dev_key(GENESIS_SEED),
            stake: None,
            description: Description {
                name: "genesis".to_string(),
                ..Default::default()
            },
        }],
        balances: funded
            .map(|address| GenesisBalance {
                address,
                amount: DEV_BALANCE,
            })
            .collect(),
        delegations: (accounts >= 2)
            .then(|| GenesisDelegation {
                delegator: dev_address(2),
                candidate: owner,
                amount: 1,
            })
            .into_iter()
            .collect(),
        params,
    }
}
