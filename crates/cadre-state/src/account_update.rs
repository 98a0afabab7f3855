use cadre_types::validator::{AccountUpdateRequest, RequestState};

use super::*;

fn by_id(id: u64) -> String {
    format!("account_updates/by_id/{id:020}")
}

fn by_target(address: Address) -> String {
    format!("account_updates/by_target/{address}")
}

impl State {
    pub async fn account_update_request(
        &self,
        id: u64,
    ) -> Result<Option<AccountUpdateRequest>, Report> {
        self.store.get(Stake, &by_id(id)).await
    }

    /// Whether any request, pending or completed, has ever targeted `address`.
    pub async fn is_account_update_target(&self, address: Address) -> Result<bool, Report> {
        Ok(self
            .store
            .get::<u64>(Stake, &by_target(address))
            .await?
            .is_some())
    }

    pub(crate) async fn create_account_update_request(
        &mut self,
        candidate_id: u64,
        from_address: Address,
        to_address: Address,
    ) -> Result<AccountUpdateRequest, Report> {
        let request = AccountUpdateRequest {
            id: self.next_id("account_update").await?,
            candidate_id,
            from_address,
            to_address,
            created_block_height: self.block_height().await?,
            accepted_block_height: 0,
            state: RequestState::Pending,
        };
        self.store
            .put(Stake, &by_target(to_address), request.id)
            .await?;
        self.save_account_update_request(&request).await?;
        Ok(request)
    }

    pub(crate) async fn save_account_update_request(
        &mut self,
        request: &AccountUpdateRequest,
    ) -> Result<(), Report> {
        self.store.put(Stake, &by_id(request.id), request).await
    }
}
