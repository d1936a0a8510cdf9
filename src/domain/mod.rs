//! Domain module
//!
//! Core domain types and business rules.

pub mod amount;
pub mod error;
pub mod models;

pub use amount::{round_to_cents, Amount, AmountError, MONEY_SCALE};
pub use error::DomainError;
pub use models::{
    Account, BalanceForecast, Credit, EntryKind, LedgerEntry, OverdueInstallment, PeriodTotals,
    ScheduleEntry,
};
