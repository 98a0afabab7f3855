use super::*;

/// Account collecting gas fees.
pub const HOLD_ACCOUNT: Address = Address::new([0xff; 20]);

impl State {
    pub async fn balance(&self, address: Address) -> Result<u128, Report> {
        Ok(self
            .store
            .get::<u128>(Bank, &format!("balances/{address}"))
            .await?
            .unwrap_or(0))
    }

    pub(crate) async fn set_balance(&mut self, address: Address, amount: u128) -> Result<(), Report> {
        self.store
            .put(Bank, &format!("balances/{address}"), amount)
            .await
    }

    /// Move `fee` from `payer` to the hold account, if `payer` can cover it.
    pub(crate) async fn charge_gas(&mut self, payer: Address, fee: u128) -> Result<(), TxFailure> {
        let balance = self.balance(payer).await?;
        if balance < fee {
            return Err(StakeError::InsufficientFunds.into());
        }
        if fee == 0 {
            return Ok(());
        }
        self.set_balance(payer, balance - fee).await?;
        let held = self.balance(HOLD_ACCOUNT).await?;
        self.set_balance(HOLD_ACCOUNT, held.saturating_add(fee))
            .await?;
        Ok(())
    }

    pub(crate) async fn add_delegation(
        &mut self,
        delegator: Address,
        candidate: Address,
        amount: u64,
    ) -> Result<(), Report> {
        let key = format!("delegations/{delegator}/{candidate}");
        let existing = self.store.get::<u64>(Bank, &key).await?.unwrap_or(0);
        self.store
            .put(Bank, &key, existing.saturating_add(amount))
            .await
    }

    /// Whether `address` has delegated stake to any candidate.
    pub async fn is_delegator(&self, address: Address) -> Result<bool, Report> {
        let mut stream = Box::pin(
            self.store
                .prefix::<u64>(Bank, &format!("delegations/{address}/"))
                .await,
        );
        while let Some(entry) = stream.next().await {
            let (_, amount) = entry?;
            if amount > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
