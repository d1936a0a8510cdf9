//! Credit Handler
//!
//! Issues credits: computes the annuity payment, expands it into a monthly
//! schedule and persists the credit together with every installment.

use std::sync::Arc;

use uuid::Uuid;

use crate::amortization::AmortizationPlan;
use crate::clock::Clock;
use crate::domain::{DomainError, ScheduleEntry};
use crate::error::AppError;
use crate::store::{LedgerStore, NewCredit};

use super::{load_owned_account, IssueCreditCommand, IssuedCredit};

/// Handler for credit issuance and schedule lookups
pub struct CreditHandler {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl CreditHandler {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue a credit against an existing account.
    ///
    /// The first installment is due one calendar month after today. Input
    /// validation happens before anything is written; the credit and its
    /// schedule are stored as one unit.
    pub async fn issue(&self, command: IssueCreditCommand) -> Result<IssuedCredit, AppError> {
        let plan = AmortizationPlan::generate(
            command.principal,
            command.annual_rate,
            command.term_months,
            self.clock.today(),
        )?;

        if self.store.find_account(command.account_id).await?.is_none() {
            return Err(DomainError::AccountNotFound(command.account_id).into());
        }

        let new_credit = NewCredit {
            account_id: command.account_id,
            principal: plan.principal,
            term_months: plan.term_months,
            annual_rate: plan.annual_rate,
            monthly_payment: plan.monthly_payment,
        };

        let (credit, schedule) = self
            .store
            .create_credit(new_credit, &plan.installments)
            .await?;

        tracing::info!(
            credit_id = %credit.id,
            account_id = %credit.account_id,
            principal = %credit.principal,
            monthly_payment = %credit.monthly_payment,
            term_months = credit.term_months,
            "Credit issued"
        );

        Ok(IssuedCredit { credit, schedule })
    }

    /// Repayment schedule of a credit ordered by due date
    pub async fn schedule(&self, credit_id: Uuid) -> Result<Vec<ScheduleEntry>, AppError> {
        if self.store.find_credit(credit_id).await?.is_none() {
            return Err(DomainError::CreditNotFound(credit_id).into());
        }

        Ok(self.store.schedule_for_credit(credit_id).await?)
    }

    /// Repayment schedule of a credit whose account `owner_id` owns
    pub async fn schedule_for_owner(
        &self,
        credit_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Vec<ScheduleEntry>, AppError> {
        let credit = self
            .store
            .find_credit(credit_id)
            .await?
            .ok_or(DomainError::CreditNotFound(credit_id))?;

        load_owned_account(self.store.as_ref(), credit.account_id, owner_id).await?;

        Ok(self.store.schedule_for_credit(credit_id).await?)
    }
}
