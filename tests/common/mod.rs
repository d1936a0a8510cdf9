//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use billing_ledger::clock::{Clock, FixedClock};
use billing_ledger::store::{LedgerStore, MemoryLedgerStore};

/// In-memory store driven by a fixed clock starting 2026-01-15 09:00 UTC
pub struct TestLedger {
    pub store: Arc<MemoryLedgerStore>,
    pub clock: Arc<FixedClock>,
}

impl TestLedger {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryLedgerStore::new(clock.clone()));
        Self { store, clock }
    }

    pub fn store(&self) -> Arc<dyn LedgerStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Open an account for `owner` and deposit `balance` into it
    pub async fn account_with_balance(&self, owner: Uuid, balance: Decimal) -> Uuid {
        let account = self.store.create_account(owner).await.unwrap();
        if balance > Decimal::ZERO {
            self.store.deposit(account.id, balance).await.unwrap();
        }
        account.id
    }

    pub async fn balance(&self, account_id: Uuid) -> Decimal {
        self.store
            .find_account(account_id)
            .await
            .unwrap()
            .expect("account exists")
            .balance
    }
}

/// Setup test database - truncate all billing tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    assert!(
        billing_ledger::db::check_schema(&pool).await.unwrap(),
        "Run migrations/0001_billing_schema.sql first"
    );

    // TRUNCATE bypasses the append-only row trigger on ledger_entries
    sqlx::query("TRUNCATE TABLE ledger_entries, payment_schedules, credits, accounts CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}
