use std::fmt::{Debug, Display};
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use cnidarium::{Snapshot, StateDelta, StateRead, StateWrite, Storage};
use color_eyre::{Report, eyre::eyre};
use futures::{Stream, StreamExt};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;

const SUBSTORES: [&str; 3] = ["chain", "stake", "bank"];

#[derive(Clone)]
pub struct Store {
    storage: Storage,
    delta: Arc<RwLock<StateDelta<Snapshot>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Substore {
    /// Chain bookkeeping: identity, height, time, parameters.
    Chain,
    /// Candidates, their indexes, and account update requests.
    Stake,
    /// Balances and delegations.
    Bank,
}

impl Display for Substore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Substore::Chain => write!(f, "chain"),
            Substore::Stake => write!(f, "stake"),
            Substore::Bank => write!(f, "bank"),
        }
    }
}

impl Substore {
    pub fn prefix(&self, key: &str) -> String {
        format!("{}/{}", self, key)
    }

    pub fn unprefix<'a>(&self, prefixed_key: &'a str) -> Option<&'a str> {
        let prefix = format!("{}/", self);
        prefixed_key.strip_prefix(&prefix)
    }
}

impl Store {
    /// Open (or create) storage at `path`.
    pub async fn init(path: PathBuf) -> Result<Self, Report> {
        let storage = Storage::init(path, SUBSTORES.map(Into::into).to_vec())
            .await
            .map_err(|e| eyre!(e))?;
        let latest = storage.latest_snapshot();
        Ok(Self::new(storage, latest))
    }

    fn new(storage: Storage, base: Snapshot) -> Self {
        Self {
            delta: Arc::new(RwLock::new(StateDelta::new(base))),
            storage,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// A store reading the committed state as of `version`, if storage still holds a snapshot
    /// of it.
    ///
    /// Writes to the returned store cannot be committed; it is meant for historical queries.
    pub fn at_version(&self, version: u64) -> Option<Self> {
        let snapshot = self.storage.snapshot(version)?;
        Some(Self::new(self.storage.clone(), snapshot))
    }

    /// Commit all pending changes to the underlying storage, returning the new version.
    pub async fn commit(&mut self) -> Result<u64, Report> {
        let delta = mem::replace(
            &mut *self.delta.write().await,
            StateDelta::new(self.storage.latest_snapshot()),
        );
        self.storage.commit(delta).await.map_err(|e| eyre!(e))?;

        // Rebase onto what was just committed, or later reads would see the old snapshot.
        let latest = self.storage.latest_snapshot();
        let version = latest.version();
        *self.delta.write().await = StateDelta::new(latest);

        Ok(version)
    }

    /// Discard all pending changes.
    pub fn abort(&mut self) {
        self.delta = Arc::new(RwLock::new(StateDelta::new(
            self.storage.latest_snapshot(),
        )));
    }

    /// Create a logical fork of the store. Writes to either side are invisible to the other.
    pub async fn fork(&self) -> Self {
        let fork = self.delta.write().await.fork();
        Self {
            storage: self.storage.clone(),
            delta: Arc::new(RwLock::new(fork)),
        }
    }

    /// Adopt the pending changes of a fork of this store, dropping any of our own made since.
    pub async fn absorb(&mut self, fork: Store) {
        let delta = mem::replace(
            &mut *fork.delta.write().await,
            StateDelta::new(self.storage.latest_snapshot()),
        );
        *self.delta.write().await = delta;
    }

    /// Get a value from the state by key, decoding it from JSON.
    pub async fn get<V: DeserializeOwned>(
        &self,
        substore: Substore,
        key: &str,
    ) -> Result<Option<V>, Report> {
        let bytes = self
            .delta
            .read()
            .await
            .get_raw(&substore.prefix(key))
            .await
            .map_err(|e| eyre!(e))?;
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Set a value in the state by key, encoding it as JSON.
    pub async fn put<V: Serialize + Debug>(
        &mut self,
        substore: Substore,
        key: &str,
        value: V,
    ) -> Result<(), Report> {
        let bytes = serde_json::to_vec(&value)?;
        self.delta
            .write()
            .await
            .put_raw(substore.prefix(key), bytes);
        Ok(())
    }

    /// Delete a value from the state by key.
    pub async fn delete(&mut self, substore: Substore, key: &str) {
        self.delta.write().await.delete(substore.prefix(key));
    }

    /// Get a stream over all key-value pairs in the state with the given prefix, decoding the
    /// values from JSON. Keys are yielded in order, without their substore prefix.
    pub async fn prefix<V: DeserializeOwned + Send + 'static>(
        &self,
        substore: Substore,
        prefix: &str,
    ) -> impl Stream<Item = Result<(String, V), Report>> + Send + 'static {
        self.delta
            .read()
            .await
            .prefix_raw(&substore.prefix(prefix))
            .map(move |res| {
                let (key, bytes) = res.map_err(|e| eyre!(e))?;
                let v = serde_json::from_slice(&bytes)?;
                let key = substore
                    .unprefix(&key)
                    .ok_or_else(|| eyre!("key {key} from wrong substore"))?
                    .to_string();
                Ok((key, v))
            })
    }
}
