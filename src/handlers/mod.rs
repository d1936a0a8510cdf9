//! Command Handlers module
//!
//! Handlers validate a command, enforce ownership and hand the money
//! movement to the store as one atomic operation. Each handler is built
//! from an explicitly injected store.

mod account_handler;
mod commands;
mod credit_handler;
mod deposit_handler;
mod forecast_handler;
mod transfer_handler;
mod withdraw_handler;

#[cfg(test)]
mod tests;

use uuid::Uuid;

use crate::domain::{Account, DomainError};
use crate::error::AppError;
use crate::store::LedgerStore;

pub use account_handler::AccountHandler;
pub use commands::*;
pub use credit_handler::CreditHandler;
pub use deposit_handler::DepositHandler;
pub use forecast_handler::{PredictBalanceHandler, MAX_HORIZON_DAYS};
pub use transfer_handler::TransferHandler;
pub use withdraw_handler::WithdrawHandler;

/// Load an account and check it belongs to `owner_id`.
///
/// Account ownership never changes, so this read does not race with
/// concurrent balance updates.
pub async fn load_owned_account(
    store: &dyn LedgerStore,
    account_id: Uuid,
    owner_id: Uuid,
) -> Result<Account, AppError> {
    let account = store
        .find_account(account_id)
        .await?
        .ok_or(DomainError::AccountNotFound(account_id))?;

    if !account.is_owned_by(owner_id) {
        tracing::warn!(
            account_id = %account_id,
            owner_id = %owner_id,
            "Rejected access to account owned by someone else"
        );
        return Err(DomainError::Forbidden {
            account_id,
            owner_id,
        }
        .into());
    }

    Ok(account)
}
