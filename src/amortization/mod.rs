//! Amortization Calculator
//!
//! Turns (principal, annual rate, term) into a fixed annuity payment and
//! the installment plan that repays it. Pure functions, no storage access.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use crate::domain::{round_to_cents, Amount, DomainError};

/// One installment of a generated plan, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedInstallment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

/// Fixed-payment repayment plan for a credit.
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationPlan {
    pub principal: Decimal,
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub monthly_payment: Decimal,
    pub installments: Vec<PlannedInstallment>,
}

impl AmortizationPlan {
    /// Compute the annuity payment and expand it into `term_months`
    /// installments due one calendar month apart, starting one month after
    /// `issue_date`.
    pub fn generate(
        principal: Decimal,
        annual_rate: Decimal,
        term_months: u32,
        issue_date: NaiveDate,
    ) -> Result<Self, DomainError> {
        let monthly_payment = annuity_payment(principal, annual_rate, term_months)?;
        let installments = build_schedule(monthly_payment, issue_date, term_months)?;

        Ok(Self {
            principal,
            annual_rate,
            term_months,
            monthly_payment,
            installments,
        })
    }

    /// Sum of all installments
    pub fn total_payment(&self) -> Decimal {
        self.installments.iter().map(|i| i.amount).sum()
    }

    /// Interest paid over the life of the credit (may be slightly off zero
    /// for zero-rate credits because of cent rounding)
    pub fn total_interest(&self) -> Decimal {
        self.total_payment() - self.principal
    }
}

/// Longest term a credit can be issued for (50 years)
pub const MAX_TERM_MONTHS: u32 = 600;

/// Annual rates must stay strictly below this percentage
pub const MAX_ANNUAL_RATE: Decimal = dec!(1000000);

/// Decimal places a stored annual rate keeps
pub const RATE_SCALE: u32 = 4;

/// Fixed monthly payment that amortizes `principal` over `term_months`.
///
/// `annual_rate` is a percentage (12 means 12% a year) with at most
/// [`RATE_SCALE`] decimals. The result is rounded to the cent and is always
/// positive; inputs that would round it down to zero are rejected.
pub fn annuity_payment(
    principal: Decimal,
    annual_rate: Decimal,
    term_months: u32,
) -> Result<Decimal, DomainError> {
    let principal = Amount::new(principal)
        .map_err(|e| DomainError::invalid(format!("principal: {}", e)))?
        .value();

    if annual_rate < Decimal::ZERO {
        return Err(DomainError::invalid(format!(
            "annual rate must not be negative (got {})",
            annual_rate
        )));
    }

    if annual_rate >= MAX_ANNUAL_RATE {
        return Err(DomainError::invalid(format!(
            "annual rate must be below {} (got {})",
            MAX_ANNUAL_RATE, annual_rate
        )));
    }

    if annual_rate.normalize().scale() > RATE_SCALE {
        return Err(DomainError::invalid(format!(
            "annual rate has more than {} decimal places (got {})",
            RATE_SCALE, annual_rate
        )));
    }

    if term_months == 0 {
        return Err(DomainError::invalid("term must be at least one month"));
    }

    if term_months > MAX_TERM_MONTHS {
        return Err(DomainError::invalid(format!(
            "term must not exceed {} months (got {})",
            MAX_TERM_MONTHS, term_months
        )));
    }

    let payment = if annual_rate.is_zero() {
        round_to_cents(principal / Decimal::from(term_months))
    } else {
        // P * r * (1 + r)^n / ((1 + r)^n - 1)
        let monthly_rate = annual_rate / dec!(12) / dec!(100);
        let compound = (Decimal::ONE + monthly_rate)
            .checked_powu(u64::from(term_months))
            .ok_or_else(|| DomainError::invalid("rate and term overflow the payment formula"))?;

        let numerator = principal
            .checked_mul(monthly_rate)
            .and_then(|v| v.checked_mul(compound))
            .ok_or_else(|| DomainError::invalid("rate and term overflow the payment formula"))?;
        let payment = numerator
            .checked_div(compound - Decimal::ONE)
            .ok_or_else(|| DomainError::invalid("rate is too small for the payment formula"))?;

        round_to_cents(payment)
    };

    if payment <= Decimal::ZERO {
        return Err(DomainError::invalid(format!(
            "principal {} over {} months rounds to a zero payment",
            principal, term_months
        )));
    }

    Ok(payment)
}

/// Expand a monthly payment into `term_months` unpaid installments.
///
/// Due dates are `issue_date + i months` for `i = 1..=term_months`; a day
/// past the end of a shorter month is clamped to that month's last day.
pub fn build_schedule(
    monthly_payment: Decimal,
    issue_date: NaiveDate,
    term_months: u32,
) -> Result<Vec<PlannedInstallment>, DomainError> {
    if term_months == 0 {
        return Err(DomainError::invalid("term must be at least one month"));
    }

    (1..=term_months)
        .map(|number| {
            let due_date = issue_date
                .checked_add_months(Months::new(number))
                .ok_or_else(|| DomainError::invalid("due date out of range"))?;

            Ok(PlannedInstallment {
                number,
                due_date,
                amount: monthly_payment,
            })
        })
        .collect()
}
