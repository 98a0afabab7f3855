//! A devnet set up for one scenario and torn down after it.
//!
//! [`Fixture::scoped`] starts a fresh chain with its own pool of funded accounts, tops the
//! candidate list up with throwaway validators, runs the scenario, and then withdraws those
//! validators and stops the chain. Teardown runs whether the scenario succeeds, fails or
//! panics.

use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use cadre_client::{ConsensusClient, PollConfig, Poller, Rpc, StakeClient, Url};
use cadre_types::key::encode_pub_key;
use cadre_types::transaction::StakeTx;
use cadre_types::validator::Description;
use cadre_types::{Address, PublicKey};
use color_eyre::{
    Report,
    eyre::{WrapErr, bail},
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::AbortHandle;

use crate::config::DevnetConfig;
use crate::keys::{GENESIS_SEED, dev_address, dev_genesis, dev_key};
use crate::node::Devnet;
use crate::server;

/// Candidates the fixture makes sure exist before a scenario starts.
pub const MIN_VALIDATORS: usize = 4;

/// Seeds from which fresh, unfunded accounts are drawn.
const FRESH_SEEDS: u8 = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// The chain to run. Its genesis accounts are replaced by the fixture's own pool.
    pub devnet: DevnetConfig,
    pub poll: PollConfig,
    /// Size of the funded account pool.
    pub accounts: u8,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            devnet: DevnetConfig::default(),
            poll: PollConfig::default(),
            accounts: 6,
        }
    }
}

pub struct Fixture {
    devnet: Arc<Devnet>,
    client: StakeClient<Devnet>,
    consensus: ConsensusClient,
    server: AbortHandle,
    accounts: Vec<Address>,
    foundation: Address,
    fresh: AtomicU8,
}

impl Fixture {
    /// Run `scenario` against a fresh fixture, tearing it down afterwards.
    ///
    /// A panic inside the scenario is resumed after teardown. If both the scenario and the
    /// teardown fail, the scenario's error is returned and the teardown's logged.
    pub async fn scoped<F, Fut, T>(config: FixtureConfig, scenario: F) -> Result<T, Report>
    where
        F: FnOnce(Arc<Fixture>) -> Fut,
        Fut: Future<Output = Result<T, Report>>,
    {
        let fixture = Arc::new(Fixture::setup(config).await?);
        let outcome = AssertUnwindSafe(scenario(fixture.clone()))
            .catch_unwind()
            .await;
        let teardown = fixture.teardown().await;

        match outcome {
            Err(panic) => {
                if let Err(e) = teardown {
                    error!(%e, "teardown failed");
                }
                resume_unwind(panic)
            }
            Ok(Err(e)) => {
                if let Err(teardown) = teardown {
                    error!(e = %teardown, "teardown failed");
                }
                Err(e)
            }
            Ok(Ok(value)) => teardown.map(|()| value),
        }
    }

    #[instrument(skip(config), fields(accounts = config.accounts))]
    async fn setup(config: FixtureConfig) -> Result<Self, Report> {
        let FixtureConfig {
            mut devnet,
            poll,
            accounts,
        } = config;
        if accounts as usize <= MIN_VALIDATORS {
            bail!("a fixture needs more than {MIN_VALIDATORS} accounts, got {accounts}");
        }
        let genesis = &devnet.genesis;
        devnet.genesis = dev_genesis(&genesis.chain_id, genesis.params.clone(), accounts);
        let foundation = devnet.genesis.params.foundation_address;

        let devnet = Arc::new(Devnet::start(devnet).await?);
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = Url::parse(&format!("http://{}/", listener.local_addr()?))?;
        let server = tokio::spawn(server::serve(listener, devnet.clone())).abort_handle();

        let poller = Poller::new(devnet.clone(), poll);
        let fixture = Fixture {
            client: StakeClient::new(devnet.clone(), poller),
            consensus: ConsensusClient::new(base),
            devnet,
            server,
            accounts: (1..=accounts).map(dev_address).collect(),
            foundation,
            fresh: AtomicU8::new(FRESH_SEEDS),
        };
        fixture
            .add_fake_validators()
            .await
            .wrap_err("failed to add fake validators")?;
        Ok(fixture)
    }

    async fn teardown(&self) -> Result<(), Report> {
        let result = if self.devnet.is_halted() {
            warn!("chain is halted; leaving fake validators in place");
            Ok(())
        } else {
            self.remove_fake_validators().await
        };
        self.server.abort();
        self.devnet.shutdown();
        result
    }

    pub fn devnet(&self) -> &Arc<Devnet> {
        &self.devnet
    }

    pub fn client(&self) -> &StakeClient<Devnet> {
        &self.client
    }

    pub fn poller(&self) -> &Poller<Devnet> {
        self.client.poller()
    }

    pub fn consensus(&self) -> &ConsensusClient {
        &self.consensus
    }

    /// The `index`th funded account of the pool.
    ///
    /// # Panics
    ///
    /// If `index` is not below [`FixtureConfig::accounts`]; see [`Fixture::try_account`].
    pub fn account(&self, index: usize) -> Address {
        self.accounts[index]
    }

    /// The `index`th funded account of the pool, if the pool is that large.
    pub fn try_account(&self, index: usize) -> Option<Address> {
        self.accounts.get(index).copied()
    }

    /// The consensus key set aside for the `index`th account, as carried in requests.
    pub fn pub_key(&self, index: usize) -> String {
        encode_pub_key(&self.pub_key_raw(index))
    }

    pub fn pub_key_raw(&self, index: usize) -> PublicKey {
        dev_key(index as u8 + 1)
    }

    pub fn foundation(&self) -> Address {
        self.foundation
    }

    /// The owner of the genesis validator.
    pub fn genesis_owner(&self) -> Address {
        dev_address(GENESIS_SEED)
    }

    /// An account nobody has used yet, with no funds.
    pub fn new_account(&self) -> Address {
        dev_address(self.fresh.fetch_add(1, Ordering::Relaxed))
    }

    /// Declare candidates from the pool until at least [`MIN_VALIDATORS`] are registered.
    pub async fn add_fake_validators(&self) -> Result<(), Report> {
        let registered = self.client.list_validators().await?.len();
        let missing = MIN_VALIDATORS.saturating_sub(registered);
        let requests = (0..missing)
            .map(|i| {
                Ok((
                    self.account(i),
                    StakeTx::declare(&self.pub_key(i), Description::default())?,
                ))
            })
            .collect::<Result<Vec<_>, Report>>()?;

        for result in self.client.execute_many(requests).await? {
            if !result.is_ok() {
                bail!("fake validator was rejected with code {:?}", result.error_code());
            }
        }
        info!(added = missing, "fake validators ready");
        Ok(())
    }

    /// Withdraw every candidate except the first one registered.
    pub async fn remove_fake_validators(&self) -> Result<(), Report> {
        let requests: Vec<_> = self
            .client
            .list_validators()
            .await?
            .into_iter()
            .skip(1)
            .map(|record| (record.owner_address, StakeTx::Withdraw))
            .collect();
        let removed = requests.len();

        for result in self.client.execute_many(requests).await? {
            if !result.is_ok() {
                warn!(hash = %result.hash, code = ?result.error_code(), "withdrawal was rejected");
            }
        }
        info!(removed, "fake validators removed");
        Ok(())
    }

    /// Whether the consensus layer currently runs with `pub_key`.
    pub async fn in_consensus(&self, pub_key: &PublicKey) -> Result<bool, Report> {
        let validators = self.devnet.consensus_validators().await?;
        Ok(validators.power_of(pub_key).is_some())
    }
}
