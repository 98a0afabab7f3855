use super::*;

impl State {
    /// Get the chain ID from the state.
    pub async fn chain_id(&self) -> Result<String, Report> {
        self.store
            .get::<String>(Chain, "parameters/chain_id")
            .await?
            .ok_or_eyre("chain ID not found in state; is the state initialized?")
    }

    /// Set the chain ID in the state.
    ///
    /// This should only be called once, during initial setup.
    pub(crate) async fn set_chain_id(&mut self, chain_id: &str) -> Result<(), Report> {
        if self.chain_id().await.is_ok() {
            bail!("chain ID is already set; cannot set it again");
        }
        self.store.put(Chain, "parameters/chain_id", chain_id).await
    }

    pub async fn params(&self) -> Result<Params, Report> {
        self.store
            .get::<Params>(Chain, "parameters/stake")
            .await?
            .ok_or_eyre("staking parameters not found in state; is the state initialized?")
    }

    pub(crate) async fn set_params(&mut self, params: &Params) -> Result<(), Report> {
        self.store.put(Chain, "parameters/stake", params).await
    }

    /// Get the current block height from the state, else default to 0.
    pub async fn block_height(&self) -> Result<u64, Report> {
        Ok(self
            .store
            .get::<u64>(Chain, "current/block_height")
            .await?
            .unwrap_or(0))
    }

    pub(crate) async fn set_block_height(&mut self, height: u64) -> Result<(), Report> {
        self.store.put(Chain, "current/block_height", height).await
    }

    /// Time of the current block, in seconds since the Unix epoch.
    pub async fn block_time(&self) -> Result<u64, Report> {
        Ok(self
            .store
            .get::<u64>(Chain, "current/block_time")
            .await?
            .unwrap_or(0))
    }

    pub(crate) async fn set_block_time(&mut self, time: u64) -> Result<(), Report> {
        self.store.put(Chain, "current/block_time", time).await
    }

    /// Next value of a monotonically increasing counter, starting at 1.
    pub(crate) async fn next_id(&mut self, counter: &str) -> Result<u64, Report> {
        let key = format!("counters/{counter}");
        let next = self.store.get::<u64>(Chain, &key).await?.unwrap_or(0) + 1;
        self.store.put(Chain, &key, next).await?;
        Ok(next)
    }
}
