use cadre_types::response::ConsensusValidators;
use reqwest::Url;

use crate::rpc::RpcError;

/// Reads the validator set straight from a consensus node's HTTP endpoint.
#[derive(Clone, Debug)]
pub struct ConsensusClient {
    http: reqwest::Client,
    base: Url,
}

impl ConsensusClient {
    pub fn new(base: Url) -> Self {
        ConsensusClient {
            http: reqwest::Client::new(),
            base,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub async fn validators(&self) -> Result<ConsensusValidators, RpcError> {
        let url = self
            .base
            .join("validators")
            .map_err(|e| RpcError::Endpoint(e.to_string()))?;
        let validators = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(validators)
    }
}
