//! PostgreSQL ledger store
//!
//! Balance changes are single conditional `UPDATE` statements; every
//! multi-row change runs inside one sqlx transaction that is rolled back on
//! any failure (dropping an uncommitted `Transaction` rolls it back too).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::amortization::PlannedInstallment;
use crate::domain::{Account, Credit, EntryKind, LedgerEntry, OverdueInstallment, ScheduleEntry};

use super::{LedgerStore, NewCredit, SettleOutcome, StoreError, StoreResult};

type AccountRow = (Uuid, Uuid, Decimal, DateTime<Utc>);
type LedgerRow = (
    Uuid,
    Uuid,
    Option<Uuid>,
    Option<Uuid>,
    Decimal,
    String,
    DateTime<Utc>,
);
type CreditRow = (Uuid, Uuid, Decimal, i32, Decimal, Decimal, DateTime<Utc>);
type ScheduleRow = (
    Uuid,
    Uuid,
    NaiveDate,
    Decimal,
    bool,
    Option<DateTime<Utc>>,
    Decimal,
);
type OverdueRow = (Uuid, Uuid, Uuid, NaiveDate, Decimal, Decimal);

const LEDGER_COLUMNS: &str =
    "id, journal_id, from_account_id, to_account_id, amount, kind, created_at";

/// PostgreSQL-backed implementation of [`LedgerStore`]
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new store on an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_entry(
        tx: &mut Transaction<'_, Postgres>,
        journal_id: Uuid,
        from_account_id: Option<Uuid>,
        to_account_id: Option<Uuid>,
        amount: Decimal,
        kind: EntryKind,
    ) -> StoreResult<LedgerEntry> {
        let sql = format!(
            r#"
            INSERT INTO ledger_entries (journal_id, from_account_id, to_account_id, amount, kind)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            LEDGER_COLUMNS
        );

        let row: LedgerRow = sqlx::query_as(&sql)
            .bind(journal_id)
            .bind(from_account_id)
            .bind(to_account_id)
            .bind(amount)
            .bind(kind.as_str())
            .fetch_one(&mut **tx)
            .await?;

        ledger_entry_from_row(row)
    }

    /// Conditional debit inside an open transaction.
    ///
    /// On rejection the current balance is read back only to build the
    /// error; the caller rolls the transaction back.
    async fn debit_if_covered(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        amount: Decimal,
    ) -> StoreResult<Result<Decimal, Decimal>> {
        let remaining: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET balance = balance - $1
            WHERE id = $2 AND balance >= $1
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(Ok(remaining));
        }

        let available: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&mut **tx)
                .await?;

        match available {
            Some(available) => Ok(Err(available)),
            None => Err(StoreError::AccountNotFound(account_id)),
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_account(&self, owner_id: Uuid) -> StoreResult<Account> {
        let row: AccountRow = sqlx::query_as(
            r#"
            INSERT INTO accounts (owner_id, balance)
            VALUES ($1, 0)
            RETURNING id, owner_id, balance, created_at
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(account_from_row(row))
    }

    async fn find_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, owner_id, balance, created_at FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(account_from_row))
    }

    async fn accounts_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Account>> {
        let rows: Vec<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, balance, created_at
            FROM accounts
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(account_from_row).collect())
    }

    async fn deposit(&self, account_id: Uuid, amount: Decimal) -> StoreResult<LedgerEntry> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING id",
        )
        .bind(amount)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Err(StoreError::AccountNotFound(account_id));
        }

        let entry = Self::insert_entry(
            &mut tx,
            Uuid::new_v4(),
            None,
            Some(account_id),
            amount,
            EntryKind::Deposit,
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn withdraw(&self, account_id: Uuid, amount: Decimal) -> StoreResult<LedgerEntry> {
        let mut tx = self.pool.begin().await?;

        if let Err(available) = Self::debit_if_covered(&mut tx, account_id, amount).await? {
            tx.rollback().await?;
            return Err(StoreError::InsufficientFunds {
                account_id,
                required: amount,
                available,
            });
        }

        let entry = Self::insert_entry(
            &mut tx,
            Uuid::new_v4(),
            Some(account_id),
            None,
            -amount,
            EntryKind::Withdraw,
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn transfer(
        &self,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Decimal,
    ) -> StoreResult<(LedgerEntry, LedgerEntry)> {
        let mut tx = self.pool.begin().await?;

        // Lock both rows in id order so opposing transfers cannot deadlock
        let locked: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM accounts
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(vec![from_account_id, to_account_id])
        .fetch_all(&mut *tx)
        .await?;

        for account_id in [from_account_id, to_account_id] {
            if !locked.contains(&account_id) {
                tx.rollback().await?;
                return Err(StoreError::AccountNotFound(account_id));
            }
        }

        if let Err(available) = Self::debit_if_covered(&mut tx, from_account_id, amount).await? {
            tx.rollback().await?;
            return Err(StoreError::InsufficientFunds {
                account_id: from_account_id,
                required: amount,
                available,
            });
        }

        sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE id = $2")
            .bind(amount)
            .bind(to_account_id)
            .execute(&mut *tx)
            .await?;

        let journal_id = Uuid::new_v4();
        let debit = Self::insert_entry(
            &mut tx,
            journal_id,
            Some(from_account_id),
            None,
            -amount,
            EntryKind::Transfer,
        )
        .await?;
        let credit = Self::insert_entry(
            &mut tx,
            journal_id,
            None,
            Some(to_account_id),
            amount,
            EntryKind::Transfer,
        )
        .await?;

        tx.commit().await?;
        Ok((debit, credit))
    }

    async fn entries_for_account(&self, account_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE from_account_id = $1 OR to_account_id = $1
            ORDER BY created_at DESC, id
            "#,
            LEDGER_COLUMNS
        );

        let rows: Vec<LedgerRow> = sqlx::query_as(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ledger_entry_from_row).collect()
    }

    async fn period_totals(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<(Decimal, Decimal)> {
        let totals: (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN le.amount > 0 THEN le.amount ELSE 0 END), 0) AS income,
                COALESCE(SUM(CASE WHEN le.amount < 0 THEN le.amount ELSE 0 END), 0) AS expenses
            FROM ledger_entries le
            JOIN accounts a ON a.id = COALESCE(le.to_account_id, le.from_account_id)
            WHERE a.owner_id = $1
              AND le.created_at >= $2
              AND le.created_at < $3
            "#,
        )
        .bind(owner_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    async fn create_credit(
        &self,
        credit: NewCredit,
        installments: &[PlannedInstallment],
    ) -> StoreResult<(Credit, Vec<ScheduleEntry>)> {
        let term_months = i32::try_from(credit.term_months)
            .map_err(|_| StoreError::InvalidData(format!("term {} too large", credit.term_months)))?;

        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
                .bind(credit.account_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            tx.rollback().await?;
            return Err(StoreError::AccountNotFound(credit.account_id));
        }

        let row: CreditRow = sqlx::query_as(
            r#"
            INSERT INTO credits (account_id, principal, term_months, annual_rate, monthly_payment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, account_id, principal, term_months, annual_rate, monthly_payment, created_at
            "#,
        )
        .bind(credit.account_id)
        .bind(credit.principal)
        .bind(term_months)
        .bind(credit.annual_rate)
        .bind(credit.monthly_payment)
        .fetch_one(&mut *tx)
        .await?;
        let credit = credit_from_row(row)?;

        let mut schedule = Vec::with_capacity(installments.len());
        for installment in installments {
            let row: ScheduleRow = sqlx::query_as(
                r#"
                INSERT INTO payment_schedules (credit_id, due_date, amount, paid, penalty)
                VALUES ($1, $2, $3, false, 0)
                RETURNING id, credit_id, due_date, amount, paid, paid_at, penalty
                "#,
            )
            .bind(credit.id)
            .bind(installment.due_date)
            .bind(installment.amount)
            .fetch_one(&mut *tx)
            .await?;
            schedule.push(schedule_entry_from_row(row));
        }

        tx.commit().await?;
        Ok((credit, schedule))
    }

    async fn find_credit(&self, credit_id: Uuid) -> StoreResult<Option<Credit>> {
        let row: Option<CreditRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, principal, term_months, annual_rate, monthly_payment, created_at
            FROM credits
            WHERE id = $1
            "#,
        )
        .bind(credit_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(credit_from_row).transpose()
    }

    async fn schedule_for_credit(&self, credit_id: Uuid) -> StoreResult<Vec<ScheduleEntry>> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(
            r#"
            SELECT id, credit_id, due_date, amount, paid, paid_at, penalty
            FROM payment_schedules
            WHERE credit_id = $1
            ORDER BY due_date ASC
            "#,
        )
        .bind(credit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(schedule_entry_from_row).collect())
    }

    async fn scheduled_total(&self, account_id: Uuid, until: NaiveDate) -> StoreResult<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(ps.amount + ps.penalty), 0)
            FROM payment_schedules ps
            JOIN credits c ON ps.credit_id = c.id
            WHERE c.account_id = $1
              AND ps.paid = false
              AND ps.due_date <= $2
            "#,
        )
        .bind(account_id)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn overdue_installments(&self, today: NaiveDate) -> StoreResult<Vec<OverdueInstallment>> {
        let rows: Vec<OverdueRow> = sqlx::query_as(
            r#"
            SELECT ps.id, ps.credit_id, c.account_id, ps.due_date, ps.amount, ps.penalty
            FROM payment_schedules ps
            JOIN credits c ON ps.credit_id = c.id
            WHERE ps.paid = false AND ps.due_date < $1
            ORDER BY ps.due_date, ps.id
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(schedule_entry_id, credit_id, account_id, due_date, amount, penalty)| {
                    OverdueInstallment {
                        schedule_entry_id,
                        credit_id,
                        account_id,
                        due_date,
                        amount,
                        penalty,
                    }
                },
            )
            .collect())
    }

    async fn settle_installment(
        &self,
        installment: &OverdueInstallment,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<SettleOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock holds off concurrent settlements and penalty accrual
        let paid: Option<bool> = sqlx::query_scalar(
            "SELECT paid FROM payment_schedules WHERE id = $1 FOR UPDATE",
        )
        .bind(installment.schedule_entry_id)
        .fetch_optional(&mut *tx)
        .await?;

        match paid {
            None => {
                tx.rollback().await?;
                return Err(StoreError::InvalidData(format!(
                    "schedule entry {} not found",
                    installment.schedule_entry_id
                )));
            }
            Some(true) => {
                tx.rollback().await?;
                return Ok(SettleOutcome::AlreadyPaid);
            }
            Some(false) => {}
        }

        if let Err(available) =
            Self::debit_if_covered(&mut tx, installment.account_id, installment.amount).await?
        {
            tx.rollback().await?;
            return Ok(SettleOutcome::InsufficientFunds { available });
        }

        sqlx::query("UPDATE payment_schedules SET paid = true, paid_at = $1 WHERE id = $2")
            .bind(paid_at)
            .bind(installment.schedule_entry_id)
            .execute(&mut *tx)
            .await?;

        let entry = Self::insert_entry(
            &mut tx,
            Uuid::new_v4(),
            Some(installment.account_id),
            None,
            -installment.amount,
            EntryKind::Withdraw,
        )
        .await?;

        tx.commit().await?;
        Ok(SettleOutcome::Settled(entry))
    }

    async fn accrue_penalty(
        &self,
        schedule_entry_id: Uuid,
        penalty: Decimal,
    ) -> StoreResult<Option<Decimal>> {
        let total: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE payment_schedules
            SET penalty = penalty + $1
            WHERE id = $2 AND paid = false
            RETURNING penalty
            "#,
        )
        .bind(penalty)
        .bind(schedule_entry_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(total)
    }
}

fn account_from_row((id, owner_id, balance, created_at): AccountRow) -> Account {
    Account {
        id,
        owner_id,
        balance,
        created_at,
    }
}

fn ledger_entry_from_row(
    (id, journal_id, from_account, to_account, amount, kind, created_at): LedgerRow,
) -> StoreResult<LedgerEntry> {
    let kind = kind.parse::<EntryKind>().map_err(StoreError::InvalidData)?;

    Ok(LedgerEntry {
        id,
        journal_id,
        from_account,
        to_account,
        amount,
        kind,
        created_at,
    })
}

fn credit_from_row(
    (id, account_id, principal, term_months, annual_rate, monthly_payment, created_at): CreditRow,
) -> StoreResult<Credit> {
    let term_months = u32::try_from(term_months)
        .map_err(|_| StoreError::InvalidData(format!("negative term on credit {}", id)))?;

    Ok(Credit {
        id,
        account_id,
        principal,
        term_months,
        annual_rate,
        monthly_payment,
        created_at,
    })
}

fn schedule_entry_from_row(
    (id, credit_id, due_date, amount, paid, paid_at, penalty): ScheduleRow,
) -> ScheduleEntry {
    ScheduleEntry {
        id,
        credit_id,
        due_date,
        amount,
        paid,
        paid_at,
        penalty,
    }
}
