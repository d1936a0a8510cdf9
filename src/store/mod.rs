//! Durable store port
//!
//! Every method is one indivisible storage operation: balance changes are
//! conditional updates and multi-row changes commit all-or-nothing. Callers
//! never read a balance, compare it and write it back.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::amortization::PlannedInstallment;
use crate::domain::{Account, Credit, LedgerEntry, OverdueInstallment, ScheduleEntry};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Credit terms to persist together with its installments.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCredit {
    pub account_id: Uuid,
    pub principal: Decimal,
    pub term_months: u32,
    pub annual_rate: Decimal,
    pub monthly_payment: Decimal,
}

/// Result of trying to collect one installment.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// Account debited, installment marked paid, withdraw entry written
    Settled(LedgerEntry),
    /// Balance below the installment amount; nothing changed
    InsufficientFunds { available: Decimal },
    /// Installment was already paid; nothing changed
    AlreadyPaid,
}

#[async_trait]
pub trait LedgerStore: Send + Sync + std::fmt::Debug {
    // ---- accounts -------------------------------------------------------

    /// Insert an account with a zero balance
    async fn create_account(&self, owner_id: Uuid) -> StoreResult<Account>;

    async fn find_account(&self, account_id: Uuid) -> StoreResult<Option<Account>>;

    /// Accounts of one owner, newest first
    async fn accounts_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Account>>;

    // ---- money movement -------------------------------------------------

    /// Increase the balance and append a deposit entry.
    ///
    /// Fails with `AccountNotFound` if the account does not exist.
    async fn deposit(&self, account_id: Uuid, amount: Decimal) -> StoreResult<LedgerEntry>;

    /// Decrease the balance only if it covers `amount`, and append a
    /// withdraw entry.
    ///
    /// Fails with `InsufficientFunds` (no side effects) when it does not.
    async fn withdraw(&self, account_id: Uuid, amount: Decimal) -> StoreResult<LedgerEntry>;

    /// Move `amount` between two accounts and append both legs, or change
    /// nothing at all.
    ///
    /// Returns `(debit leg, credit leg)`.
    async fn transfer(
        &self,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
    ) -> StoreResult<(LedgerEntry, LedgerEntry)>;

    // ---- transaction log ------------------------------------------------

    /// Entries referencing an account, newest first
    async fn entries_for_account(&self, account_id: Uuid) -> StoreResult<Vec<LedgerEntry>>;

    /// Sum of positive and sum of negative amounts on entries of the owner's
    /// accounts created in `[from, to)`.
    async fn period_totals(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<(Decimal, Decimal)>;

    // ---- credits --------------------------------------------------------

    /// Insert a credit and all its installments in one unit.
    async fn create_credit(
        &self,
        credit: NewCredit,
        installments: &[PlannedInstallment],
    ) -> StoreResult<(Credit, Vec<ScheduleEntry>)>;

    async fn find_credit(&self, credit_id: Uuid) -> StoreResult<Option<Credit>>;

    /// Installments of one credit ordered by due date
    async fn schedule_for_credit(&self, credit_id: Uuid) -> StoreResult<Vec<ScheduleEntry>>;

    /// Sum of `amount + penalty` of unpaid installments of the account due
    /// on or before `until`.
    async fn scheduled_total(&self, account_id: Uuid, until: NaiveDate) -> StoreResult<Decimal>;

    // ---- collections ----------------------------------------------------

    /// Unpaid installments with a due date strictly before `today`
    async fn overdue_installments(&self, today: NaiveDate) -> StoreResult<Vec<OverdueInstallment>>;

    /// Debit the installment amount, mark the installment paid at `paid_at`
    /// and append a withdraw entry, all in one unit.
    async fn settle_installment(
        &self,
        installment: &OverdueInstallment,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<SettleOutcome>;

    /// Add `penalty` to an unpaid installment's accumulator and return the
    /// new total. A paid installment is left untouched.
    async fn accrue_penalty(&self, schedule_entry_id: Uuid, penalty: Decimal)
        -> StoreResult<Option<Decimal>>;
}
