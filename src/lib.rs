//! billing_ledger Library
//!
//! Account ledger, credit amortization and collections. Re-exports modules
//! for the binary and the integration tests.

pub mod amortization;
pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod handlers;
pub mod jobs;
pub mod store;
pub mod transaction_log;

pub use config::Config;
pub use domain::{Amount, AmountError, DomainError};
pub use error::{AppError, ErrorResponse};
