//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::AmountError;

/// Business rule violations raised by the ledger, the amortization
/// calculator and the forecast.
///
/// These never indicate a storage fault; a caller seeing one of them must not
/// retry the same request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Malformed amount, rate, term or horizon
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Balance cannot cover the requested debit
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Credit not found
    #[error("Credit not found: {0}")]
    CreditNotFound(Uuid),

    /// Account exists but belongs to someone else
    #[error("Forbidden: account {account_id} is not owned by {owner_id}")]
    Forbidden { account_id: Uuid, owner_id: Uuid },

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Create an invalid argument error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<AmountError> for DomainError {
    fn from(err: AmountError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(dec!(150), dec!(100));

        assert!(err.to_string().contains("150"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_amount_error_maps_to_invalid_argument() {
        let err: DomainError = AmountError::NotPositive(Decimal::ZERO).into();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }
}
