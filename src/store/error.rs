//! Store Errors
//!
//! Error types for ledger storage operations.

use rust_decimal::Decimal;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Conditional debit rejected; nothing was written
    #[error("Insufficient funds on account {account_id}: required {required}, available {available}")]
    InsufficientFunds {
        account_id: Uuid,
        required: Decimal,
        available: Decimal,
    },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row that cannot be mapped back to the domain model
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Store cannot serve requests (lock poisoned, injected fault, ...)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
