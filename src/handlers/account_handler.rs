//! Account Handler
//!
//! Opens accounts and lists the ones a user owns.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::Account;
use crate::error::AppError;
use crate::store::LedgerStore;

/// Handler for account lifecycle
pub struct AccountHandler {
    store: Arc<dyn LedgerStore>,
}

impl AccountHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Open a new account with a zero balance
    pub async fn open(&self, owner_id: Uuid) -> Result<Account, AppError> {
        let account = self.store.create_account(owner_id).await?;

        tracing::info!(
            account_id = %account.id,
            owner_id = %owner_id,
            "Account opened"
        );

        Ok(account)
    }

    /// Accounts owned by `owner_id`, newest first
    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<Account>, AppError> {
        Ok(self.store.accounts_for_owner(owner_id).await?)
    }
}
