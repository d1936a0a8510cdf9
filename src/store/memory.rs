//! In-memory ledger store
//!
//! Keeps all rows behind one mutex; each trait method runs as a single
//! critical section, which gives it the same all-or-nothing behaviour the
//! PostgreSQL store gets from conditional updates and transactions. The lock
//! is never held across an `.await`.
//!
//! Used by the test suites and for running the service without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::amortization::PlannedInstallment;
use crate::clock::Clock;
use crate::domain::{Account, Credit, EntryKind, LedgerEntry, OverdueInstallment, ScheduleEntry};

use super::{LedgerStore, NewCredit, SettleOutcome, StoreError, StoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    ledger: Vec<LedgerEntry>,
    credits: HashMap<Uuid, Credit>,
    schedule: Vec<ScheduleEntry>,
    faults: Faults,
}

/// Injected failures, for exercising error paths
#[derive(Debug, Default)]
struct Faults {
    overdue_scan: bool,
    account_reads: HashSet<Uuid>,
}

impl MemoryState {
    fn append(
        &mut self,
        journal_id: Uuid,
        from_account: Option<Uuid>,
        to_account: Option<Uuid>,
        amount: Decimal,
        kind: EntryKind,
        now: DateTime<Utc>,
    ) -> LedgerEntry {
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            journal_id,
            from_account,
            to_account,
            amount,
            kind,
            created_at: now,
        };
        self.ledger.push(entry.clone());
        entry
    }

    fn account_mut(&mut self, account_id: Uuid) -> StoreResult<&mut Account> {
        self.accounts
            .get_mut(&account_id)
            .ok_or(StoreError::AccountNotFound(account_id))
    }
}

/// In-process implementation of [`LedgerStore`]
#[derive(Debug)]
pub struct MemoryLedgerStore {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl MemoryLedgerStore {
    /// Create an empty store stamping rows with `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Make `overdue_installments` fail until cleared
    pub fn fail_overdue_scan(&self, fail: bool) -> StoreResult<()> {
        self.lock()?.faults.overdue_scan = fail;
        Ok(())
    }

    /// Make `find_account` fail for one account
    pub fn fail_account_reads(&self, account_id: Uuid) -> StoreResult<()> {
        self.lock()?.faults.account_reads.insert(account_id);
        Ok(())
    }

    /// Every ledger entry in append order
    pub fn all_entries(&self) -> StoreResult<Vec<LedgerEntry>> {
        Ok(self.lock()?.ledger.clone())
    }

    /// Sum of all account balances
    pub fn total_balance(&self) -> StoreResult<Decimal> {
        Ok(self.lock()?.accounts.values().map(|a| a.balance).sum())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_account(&self, owner_id: Uuid) -> StoreResult<Account> {
        let account = Account {
            id: Uuid::new_v4(),
            owner_id,
            balance: Decimal::ZERO,
            created_at: self.clock.now(),
        };
        self.lock()?.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        let state = self.lock()?;
        if state.faults.account_reads.contains(&account_id) {
            return Err(StoreError::Unavailable(format!(
                "injected read failure for account {}",
                account_id
            )));
        }
        Ok(state.accounts.get(&account_id).cloned())
    }

    async fn accounts_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .lock()?
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn deposit(&self, account_id: Uuid, amount: Decimal) -> StoreResult<LedgerEntry> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        state.account_mut(account_id)?.balance += amount;
        Ok(state.append(
            Uuid::new_v4(),
            None,
            Some(account_id),
            amount,
            EntryKind::Deposit,
            now,
        ))
    }

    async fn withdraw(&self, account_id: Uuid, amount: Decimal) -> StoreResult<LedgerEntry> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        let account = state.account_mut(account_id)?;
        if account.balance < amount {
            return Err(StoreError::InsufficientFunds {
                account_id,
                required: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;

        Ok(state.append(
            Uuid::new_v4(),
            Some(account_id),
            None,
            -amount,
            EntryKind::Withdraw,
            now,
        ))
    }

    async fn transfer(
        &self,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
    ) -> StoreResult<(LedgerEntry, LedgerEntry)> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        // Validate everything before the first write
        let available = state.account_mut(from_account_id)?.balance;
        state.account_mut(to_account_id)?;
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                account_id: from_account_id,
                required: amount,
                available,
            });
        }

        state.account_mut(from_account_id)?.balance -= amount;
        state.account_mut(to_account_id)?.balance += amount;

        let journal_id = Uuid::new_v4();
        let debit = state.append(
            journal_id,
            Some(from_account_id),
            None,
            -amount,
            EntryKind::Transfer,
            now,
        );
        let credit = state.append(
            journal_id,
            None,
            Some(to_account_id),
            amount,
            EntryKind::Transfer,
            now,
        );
        Ok((debit, credit))
    }

    async fn entries_for_account(&self, account_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .lock()?
            .ledger
            .iter()
            .filter(|e| e.account_id() == Some(account_id))
            .cloned()
            .collect();
        // Stable sort keeps append order for equal timestamps; reverse for newest first
        entries.sort_by_key(|e| e.created_at);
        entries.reverse();
        Ok(entries)
    }

    async fn period_totals(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<(Decimal, Decimal)> {
        let state = self.lock()?;

        let owned: HashSet<Uuid> = state
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.id)
            .collect();

        let in_period = state.ledger.iter().filter(|e| {
            e.created_at >= from
                && e.created_at < to
                && e.account_id().is_some_and(|id| owned.contains(&id))
        });

        let (income, expenses) =
            in_period.fold((Decimal::ZERO, Decimal::ZERO), |(income, expenses), e| {
                if e.amount > Decimal::ZERO {
                    (income + e.amount, expenses)
                } else {
                    (income, expenses + e.amount)
                }
            });

        Ok((income, expenses))
    }

    async fn create_credit(
        &self,
        credit: NewCredit,
        installments: &[PlannedInstallment],
    ) -> StoreResult<(Credit, Vec<ScheduleEntry>)> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        state.account_mut(credit.account_id)?;

        let credit = Credit {
            id: Uuid::new_v4(),
            account_id: credit.account_id,
            principal: credit.principal,
            term_months: credit.term_months,
            annual_rate: credit.annual_rate,
            monthly_payment: credit.monthly_payment,
            created_at: now,
        };

        let schedule: Vec<ScheduleEntry> = installments
            .iter()
            .map(|installment| ScheduleEntry {
                id: Uuid::new_v4(),
                credit_id: credit.id,
                due_date: installment.due_date,
                amount: installment.amount,
                paid: false,
                paid_at: None,
                penalty: Decimal::ZERO,
            })
            .collect();

        state.credits.insert(credit.id, credit.clone());
        state.schedule.extend(schedule.iter().cloned());
        Ok((credit, schedule))
    }

    async fn find_credit(&self, credit_id: Uuid) -> StoreResult<Option<Credit>> {
        Ok(self.lock()?.credits.get(&credit_id).cloned())
    }

    async fn schedule_for_credit(&self, credit_id: Uuid) -> StoreResult<Vec<ScheduleEntry>> {
        let mut entries: Vec<ScheduleEntry> = self
            .lock()?
            .schedule
            .iter()
            .filter(|e| e.credit_id == credit_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.due_date);
        Ok(entries)
    }

    async fn scheduled_total(&self, account_id: Uuid, until: NaiveDate) -> StoreResult<Decimal> {
        let state = self.lock()?;

        Ok(state
            .schedule
            .iter()
            .filter(|e| !e.paid && e.due_date <= until)
            .filter(|e| {
                state
                    .credits
                    .get(&e.credit_id)
                    .is_some_and(|c| c.account_id == account_id)
            })
            .map(ScheduleEntry::outstanding)
            .sum())
    }

    async fn overdue_installments(&self, today: NaiveDate) -> StoreResult<Vec<OverdueInstallment>> {
        let state = self.lock()?;
        if state.faults.overdue_scan {
            return Err(StoreError::Unavailable(
                "injected overdue scan failure".to_string(),
            ));
        }

        let mut overdue: Vec<OverdueInstallment> = state
            .schedule
            .iter()
            .filter(|e| e.is_overdue(today))
            .filter_map(|e| {
                state.credits.get(&e.credit_id).map(|c| OverdueInstallment {
                    schedule_entry_id: e.id,
                    credit_id: e.credit_id,
                    account_id: c.account_id,
                    due_date: e.due_date,
                    amount: e.amount,
                    penalty: e.penalty,
                })
            })
            .collect();
        overdue.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then(a.schedule_entry_id.cmp(&b.schedule_entry_id))
        });
        Ok(overdue)
    }

    async fn settle_installment(
        &self,
        installment: &OverdueInstallment,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<SettleOutcome> {
        let mut state = self.lock()?;

        let entry_index = state
            .schedule
            .iter()
            .position(|e| e.id == installment.schedule_entry_id)
            .ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "schedule entry {} not found",
                    installment.schedule_entry_id
                ))
            })?;
        if state.schedule[entry_index].paid {
            return Ok(SettleOutcome::AlreadyPaid);
        }

        let account = state.account_mut(installment.account_id)?;
        if account.balance < installment.amount {
            return Ok(SettleOutcome::InsufficientFunds {
                available: account.balance,
            });
        }
        account.balance -= installment.amount;

        let scheduled = &mut state.schedule[entry_index];
        scheduled.paid = true;
        scheduled.paid_at = Some(paid_at);

        let entry = state.append(
            Uuid::new_v4(),
            Some(installment.account_id),
            None,
            -installment.amount,
            EntryKind::Withdraw,
            paid_at,
        );
        Ok(SettleOutcome::Settled(entry))
    }

    async fn accrue_penalty(
        &self,
        schedule_entry_id: Uuid,
        penalty: Decimal,
    ) -> StoreResult<Option<Decimal>> {
        let mut state = self.lock()?;

        Ok(state
            .schedule
            .iter_mut()
            .find(|e| e.id == schedule_entry_id && !e.paid)
            .map(|e| {
                e.penalty += penalty;
                e.penalty
            }))
    }
}
