//! Transfer Handler
//!
//! Moves money between accounts with full validation. Either both ledger
//! legs are written together with both balance changes, or nothing is.

use std::sync::Arc;

use crate::domain::{Amount, DomainError};
use crate::error::AppError;
use crate::store::LedgerStore;

use super::{load_owned_account, TransferCommand, TransferResult};

/// Handler for transfers
pub struct TransferHandler {
    store: Arc<dyn LedgerStore>,
}

impl TransferHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Execute the transfer command
    pub async fn execute(&self, command: TransferCommand) -> Result<TransferResult, AppError> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;

        if command.from_account_id == command.to_account_id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        load_owned_account(self.store.as_ref(), command.from_account_id, command.owner_id).await?;

        let (debit, credit) = self
            .store
            .transfer(command.from_account_id, command.to_account_id, amount.value())
            .await
            .map_err(|e| {
                let err = AppError::from(e);
                tracing::warn!(
                    from_account_id = %command.from_account_id,
                    to_account_id = %command.to_account_id,
                    amount = %amount,
                    error = %err,
                    "Transfer rejected"
                );
                err
            })?;

        tracing::info!(
            from_account_id = %command.from_account_id,
            to_account_id = %command.to_account_id,
            amount = %amount,
            journal_id = %debit.journal_id,
            "Transfer completed"
        );

        Ok(TransferResult { debit, credit })
    }
}
