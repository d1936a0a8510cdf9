//! Deposit Handler
//!
//! Credits money to an account and logs a deposit entry.

use std::sync::Arc;

use crate::domain::{Amount, LedgerEntry};
use crate::error::AppError;
use crate::store::LedgerStore;

use super::DepositCommand;

/// Handler for deposits
pub struct DepositHandler {
    store: Arc<dyn LedgerStore>,
}

impl DepositHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Execute the deposit command
    pub async fn execute(&self, command: DepositCommand) -> Result<LedgerEntry, AppError> {
        // Validate before touching storage
        let amount = Amount::new(command.amount).map_err(crate::domain::DomainError::from)?;

        let entry = self.store.deposit(command.account_id, amount.value()).await?;

        tracing::info!(
            account_id = %command.account_id,
            amount = %amount,
            entry_id = %entry.id,
            "Deposit applied"
        );

        Ok(entry)
    }
}
