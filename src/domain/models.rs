//! Ledger data model
//!
//! Plain records shared by the store adapters, the handlers and the
//! collections job.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A money-holding account. `balance` is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_owned_by(&self, owner_id: Uuid) -> bool {
        self.owner_id == owner_id
    }
}

/// Kind of money movement recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdraw => "withdraw",
            EntryKind::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(EntryKind::Deposit),
            "withdraw" => Ok(EntryKind::Withdraw),
            "transfer" => Ok(EntryKind::Transfer),
            other => Err(format!("unknown ledger entry kind '{}'", other)),
        }
    }
}

/// Immutable record of one signed money movement.
///
/// Exactly one of `from_account` / `to_account` is set: outgoing legs carry
/// `from_account` and a negative amount, incoming legs carry `to_account`
/// and a positive amount. The two legs of a transfer share `journal_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub from_account: Option<Uuid>,
    pub to_account: Option<Uuid>,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The account whose balance this entry moved.
    pub fn account_id(&self) -> Option<Uuid> {
        self.to_account.or(self.from_account)
    }
}

/// A loan issued against an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: Uuid,
    pub account_id: Uuid,
    pub principal: Decimal,
    pub term_months: u32,
    pub annual_rate: Decimal,
    pub monthly_payment: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One installment of a credit's repayment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub credit_id: Uuid,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub penalty: Decimal,
}

impl ScheduleEntry {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.paid && self.due_date < today
    }

    /// Amount still owed on this installment, penalty included.
    pub fn outstanding(&self) -> Decimal {
        if self.paid {
            Decimal::ZERO
        } else {
            self.amount + self.penalty
        }
    }
}

/// An unpaid, past-due installment joined with the account it is collected from.
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueInstallment {
    pub schedule_entry_id: Uuid,
    pub credit_id: Uuid,
    pub account_id: Uuid,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub penalty: Decimal,
}

/// Income and expense totals of one owner over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub owner_id: Uuid,
    /// Sum of positive ledger amounts
    pub income: Decimal,
    /// Sum of negative ledger amounts (zero or negative)
    pub expenses: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Projected balance once scheduled installments within the horizon are paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceForecast {
    pub account_id: Uuid,
    pub horizon_days: u32,
    pub current: Decimal,
    pub projected: Decimal,
    pub total_scheduled: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(paid: bool, due: NaiveDate) -> ScheduleEntry {
        ScheduleEntry {
            id: Uuid::new_v4(),
            credit_id: Uuid::new_v4(),
            due_date: due,
            amount: dec!(100),
            paid,
            paid_at: None,
            penalty: dec!(10),
        }
    }

    #[test]
    fn test_entry_kind_round_trip_names() {
        for kind in [EntryKind::Deposit, EntryKind::Withdraw, EntryKind::Transfer] {
            assert_eq!(kind.as_str().parse::<EntryKind>(), Ok(kind));
        }
        assert!("refund".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_schedule_entry_overdue() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();

        assert!(entry(false, yesterday).is_overdue(today));
        assert!(!entry(false, today).is_overdue(today));
        assert!(!entry(true, yesterday).is_overdue(today));
    }

    #[test]
    fn test_schedule_entry_outstanding() {
        let due = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(entry(false, due).outstanding(), dec!(110));
        assert_eq!(entry(true, due).outstanding(), Decimal::ZERO);
    }

    #[test]
    fn test_ledger_entry_account_id() {
        let account = Uuid::new_v4();
        let leg = LedgerEntry {
            id: Uuid::new_v4(),
            journal_id: Uuid::new_v4(),
            from_account: Some(account),
            to_account: None,
            amount: dec!(-20),
            kind: EntryKind::Withdraw,
            created_at: Utc::now(),
        };
        assert_eq!(leg.account_id(), Some(account));
    }
}
