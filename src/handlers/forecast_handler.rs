//! Balance forecast
//!
//! Projects an account's balance after all installments due within the
//! horizon have been collected.

use std::sync::Arc;

use chrono::Duration;

use crate::clock::Clock;
use crate::domain::{BalanceForecast, DomainError};
use crate::error::AppError;
use crate::store::LedgerStore;

use super::{load_owned_account, PredictBalanceQuery};

/// Longest supported forecast horizon in days
pub const MAX_HORIZON_DAYS: u32 = 365;

/// Handler for balance predictions
pub struct PredictBalanceHandler {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl PredictBalanceHandler {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn execute(&self, query: PredictBalanceQuery) -> Result<BalanceForecast, AppError> {
        if query.horizon_days == 0 || query.horizon_days > MAX_HORIZON_DAYS {
            return Err(DomainError::invalid(format!(
                "horizon must be between 1 and {} days, got {}",
                MAX_HORIZON_DAYS, query.horizon_days
            ))
            .into());
        }

        let account = load_owned_account(self.store.as_ref(), query.account_id, query.owner_id).await?;

        let until = self.clock.today() + Duration::days(i64::from(query.horizon_days));
        let total_scheduled = self.store.scheduled_total(account.id, until).await?;

        // A negative projection is reported as is
        let projected = account.balance - total_scheduled;

        tracing::debug!(
            account_id = %account.id,
            horizon_days = query.horizon_days,
            total_scheduled = %total_scheduled,
            "Balance forecast computed"
        );

        Ok(BalanceForecast {
            account_id: account.id,
            horizon_days: query.horizon_days,
            current: account.balance,
            projected,
            total_scheduled,
        })
    }
}
