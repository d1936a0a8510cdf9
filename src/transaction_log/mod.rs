//! Transaction Log
//!
//! Read side of the append-only ledger: per-account history and the
//! income/expense totals of an owner for the current calendar month.
//! Nothing here writes; entries are only ever appended by the store's
//! money-movement operations.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{DomainError, LedgerEntry, PeriodTotals};
use crate::error::AppError;
use crate::handlers::load_owned_account;
use crate::store::LedgerStore;

/// Queries over the ledger
#[derive(Debug, Clone)]
pub struct TransactionLog {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl TransactionLog {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Income and expenses across all of the owner's accounts for the
    /// current UTC calendar month
    pub async fn monthly_summary(&self, owner_id: Uuid) -> Result<PeriodTotals, AppError> {
        let (period_start, period_end) = month_bounds(self.clock.today())?;

        let (income, expenses) = self
            .store
            .period_totals(owner_id, period_start, period_end)
            .await?;

        tracing::debug!(
            owner_id = %owner_id,
            income = %income,
            expenses = %expenses,
            "Monthly summary computed"
        );

        Ok(PeriodTotals {
            owner_id,
            income,
            expenses,
            period_start,
            period_end,
        })
    }

    /// History of an owned account, newest first
    pub async fn entries_for_account(
        &self,
        account_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        load_owned_account(self.store.as_ref(), account_id, owner_id).await?;

        Ok(self.store.entries_for_account(account_id).await?)
    }
}

/// `[first instant of the month, first instant of the next month)` for the
/// month containing `day`
pub fn month_bounds(day: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), DomainError> {
    let first = day
        .with_day(1)
        .ok_or_else(|| DomainError::invalid(format!("no first day for {}", day)))?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| DomainError::invalid(format!("month after {} out of range", first)))?;

    Ok((
        first.and_time(chrono::NaiveTime::MIN).and_utc(),
        next.and_time(chrono::NaiveTime::MIN).and_utc(),
    ))
}
