//! Command definitions
//!
//! Commands represent intentions to change the ledger; results carry the
//! rows the change produced.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Credit, LedgerEntry, ScheduleEntry};

/// Command to add money to an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCommand {
    pub account_id: Uuid,
    pub amount: Decimal,
}

impl DepositCommand {
    pub fn new(account_id: Uuid, amount: Decimal) -> Self {
        Self { account_id, amount }
    }
}

/// Command to take money out of an owned account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawCommand {
    pub account_id: Uuid,
    /// Must own `account_id`
    pub owner_id: Uuid,
    pub amount: Decimal,
}

impl WithdrawCommand {
    pub fn new(account_id: Uuid, owner_id: Uuid, amount: Decimal) -> Self {
        Self {
            account_id,
            owner_id,
            amount,
        }
    }
}

/// Command to move money between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    /// Must own `from_account_id`
    pub owner_id: Uuid,
    pub amount: Decimal,
}

impl TransferCommand {
    pub fn new(from_account_id: Uuid, to_account_id: Uuid, owner_id: Uuid, amount: Decimal) -> Self {
        Self {
            from_account_id,
            to_account_id,
            owner_id,
            amount,
        }
    }
}

/// Command to issue a credit and its repayment schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCreditCommand {
    pub account_id: Uuid,
    pub principal: Decimal,
    /// Percent per year
    pub annual_rate: Decimal,
    pub term_months: u32,
}

impl IssueCreditCommand {
    pub fn new(account_id: Uuid, principal: Decimal, annual_rate: Decimal, term_months: u32) -> Self {
        Self {
            account_id,
            principal,
            annual_rate,
            term_months,
        }
    }
}

/// Query for the projected balance of an owned account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictBalanceQuery {
    pub account_id: Uuid,
    pub owner_id: Uuid,
    pub horizon_days: u32,
}

impl PredictBalanceQuery {
    pub fn new(account_id: Uuid, owner_id: Uuid, horizon_days: u32) -> Self {
        Self {
            account_id,
            owner_id,
            horizon_days,
        }
    }
}

/// Result of a successful transfer: both legs, sharing one journal id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

impl TransferResult {
    pub fn journal_id(&self) -> Uuid {
        self.debit.journal_id
    }
}

/// Result of a successful credit issuance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedCredit {
    pub credit: Credit,
    pub schedule: Vec<ScheduleEntry>,
}
