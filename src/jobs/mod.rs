//! Scheduled Jobs
//!
//! The collections job: settles overdue credit installments from the owning
//! account's balance, or accrues a penalty when the balance is short.
//!
//! One cycle runs immediately when the scheduler starts, then once per
//! configured interval. A cycle is awaited to completion before the next
//! tick is taken, so cycles never overlap and are never cancelled halfway.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::clock::Clock;
use crate::config::{Config, DEFAULT_PENALTY_RATE};
use crate::domain::{round_to_cents, OverdueInstallment};
use crate::store::{LedgerStore, SettleOutcome, StoreError};

/// Configuration for the collections scheduler
#[derive(Debug, Clone)]
pub struct CollectionsConfig {
    /// Period between cycles (default: 12 hours)
    pub interval: Duration,
    /// Fraction of the installment amount charged per missed cycle
    pub penalty_rate: Decimal,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12 * 60 * 60),
            penalty_rate: DEFAULT_PENALTY_RATE,
        }
    }
}

impl From<&Config> for CollectionsConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.collections_interval,
            penalty_rate: config.penalty_rate,
        }
    }
}

/// What happened to one overdue installment
#[derive(Debug, Clone, PartialEq)]
enum EntryOutcome {
    Settled,
    Penalized,
    Skipped,
}

/// Report from running one collections cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub settled_count: u64,
    pub penalized_count: u64,
    pub error_count: u64,
    /// The overdue scan itself failed; no installment was looked at
    pub scan_failed: bool,
    pub completed_at: DateTime<Utc>,
}

impl CycleReport {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            settled_count: 0,
            penalized_count: 0,
            error_count: 0,
            scan_failed: false,
            completed_at: now,
        }
    }
}

/// Collections job errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Account {0} of an overdue installment does not exist")]
    MissingAccount(uuid::Uuid),
}

/// Collections scheduler - settles or penalizes overdue installments
#[derive(Debug, Clone)]
pub struct CollectionsScheduler {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: CollectionsConfig,
}

impl CollectionsScheduler {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, CollectionsConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        config: CollectionsConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Start the scheduler in the background.
    ///
    /// The first cycle runs right away. The returned handle stops the loop
    /// between cycles.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.config.interval.as_secs(),
                penalty_rate = %self.config.penalty_rate,
                "Collections scheduler started"
            );

            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Collections scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }

    /// Run one collections cycle (for the timer, manual trigger or testing)
    pub async fn run_cycle(&self) -> CycleReport {
        let now = self.clock.now();
        let today = now.date_naive();
        let mut report = CycleReport::empty(now);

        tracing::info!(today = %today, "Collections cycle started");

        let overdue = match self.store.overdue_installments(today).await {
            Ok(overdue) => overdue,
            Err(e) => {
                tracing::error!(error = %e, "Overdue scan failed; cycle aborted");
                report.scan_failed = true;
                report.completed_at = self.clock.now();
                return report;
            }
        };

        for installment in &overdue {
            match self.process(installment, now).await {
                Ok(EntryOutcome::Settled) => report.settled_count += 1,
                Ok(EntryOutcome::Penalized) => report.penalized_count += 1,
                Ok(EntryOutcome::Skipped) => {}
                Err(e) => {
                    report.error_count += 1;
                    tracing::error!(
                        schedule_entry_id = %installment.schedule_entry_id,
                        account_id = %installment.account_id,
                        error = %e,
                        "Failed to process overdue installment; skipped"
                    );
                }
            }
        }

        report.completed_at = self.clock.now();

        tracing::info!(
            overdue = overdue.len(),
            settled = report.settled_count,
            penalized = report.penalized_count,
            errors = report.error_count,
            "Collections cycle finished"
        );

        report
    }

    async fn process(
        &self,
        installment: &OverdueInstallment,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome, JobError> {
        let account = self
            .store
            .find_account(installment.account_id)
            .await?
            .ok_or(JobError::MissingAccount(installment.account_id))?;

        if account.balance >= installment.amount {
            // The store re-checks the balance inside the settlement; a
            // concurrent debit can still turn this into a shortfall
            match self.store.settle_installment(installment, now).await? {
                SettleOutcome::Settled(entry) => {
                    tracing::info!(
                        schedule_entry_id = %installment.schedule_entry_id,
                        account_id = %installment.account_id,
                        amount = %installment.amount,
                        entry_id = %entry.id,
                        "Installment settled"
                    );
                    return Ok(EntryOutcome::Settled);
                }
                SettleOutcome::AlreadyPaid => {
                    tracing::debug!(
                        schedule_entry_id = %installment.schedule_entry_id,
                        "Installment already paid"
                    );
                    return Ok(EntryOutcome::Skipped);
                }
                SettleOutcome::InsufficientFunds { available } => {
                    tracing::debug!(
                        schedule_entry_id = %installment.schedule_entry_id,
                        available = %available,
                        "Balance drained before settlement"
                    );
                }
            }
        }

        self.penalize(installment).await
    }

    async fn penalize(&self, installment: &OverdueInstallment) -> Result<EntryOutcome, JobError> {
        let penalty = penalty_for(installment.amount, self.config.penalty_rate);

        match self
            .store
            .accrue_penalty(installment.schedule_entry_id, penalty)
            .await?
        {
            Some(total) => {
                tracing::warn!(
                    schedule_entry_id = %installment.schedule_entry_id,
                    account_id = %installment.account_id,
                    penalty = %penalty,
                    total_penalty = %total,
                    "Penalty accrued on overdue installment"
                );
                Ok(EntryOutcome::Penalized)
            }
            None => Ok(EntryOutcome::Skipped),
        }
    }
}

/// Penalty for one missed cycle: a fraction of the installment amount
/// itself, never of previously accrued penalty.
pub fn penalty_for(amount: Decimal, rate: Decimal) -> Decimal {
    round_to_cents(amount * rate)
}

/// Handle to a running scheduler
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it. A cycle in progress runs to
    /// completion first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Collections scheduler task failed");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
