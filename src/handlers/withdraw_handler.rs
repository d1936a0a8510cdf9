//! Withdraw Handler
//!
//! Debits an owned account through the store's conditional update.

use std::sync::Arc;

use crate::domain::{Amount, DomainError, LedgerEntry};
use crate::error::AppError;
use crate::store::LedgerStore;

use super::{load_owned_account, WithdrawCommand};

/// Handler for withdrawals
pub struct WithdrawHandler {
    store: Arc<dyn LedgerStore>,
}

impl WithdrawHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Execute the withdraw command
    pub async fn execute(&self, command: WithdrawCommand) -> Result<LedgerEntry, AppError> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;

        load_owned_account(self.store.as_ref(), command.account_id, command.owner_id).await?;

        // The balance check happens inside the store, atomically with the debit
        let entry = self
            .store
            .withdraw(command.account_id, amount.value())
            .await
            .map_err(|e| {
                let err = AppError::from(e);
                if let Some(DomainError::InsufficientFunds { available, .. }) = err.domain() {
                    tracing::warn!(
                        account_id = %command.account_id,
                        amount = %amount,
                        available = %available,
                        "Withdrawal rejected: insufficient funds"
                    );
                }
                err
            })?;

        tracing::info!(
            account_id = %command.account_id,
            amount = %amount,
            entry_id = %entry.id,
            "Withdrawal applied"
        );

        Ok(entry)
    }
}
