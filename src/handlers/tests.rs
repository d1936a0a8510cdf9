//! Handler tests
//!
//! Run against the in-memory store with a fixed clock.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::clock::{Clock, FixedClock};
    use crate::domain::{DomainError, EntryKind};
    use crate::error::AppError;
    use crate::handlers::{
        AccountHandler, CreditHandler, DepositCommand, DepositHandler, IssueCreditCommand,
        PredictBalanceHandler, PredictBalanceQuery, TransferCommand, TransferHandler,
        WithdrawCommand, WithdrawHandler,
    };
    use crate::store::{LedgerStore, MemoryLedgerStore};

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        clock: Arc<FixedClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
            ));
            let store = Arc::new(MemoryLedgerStore::new(clock.clone()));
            Self { store, clock }
        }

        fn store(&self) -> Arc<dyn LedgerStore> {
            self.store.clone()
        }

        fn clock(&self) -> Arc<dyn Clock> {
            self.clock.clone()
        }

        async fn funded_account(&self, owner: Uuid, amount: Decimal) -> Uuid {
            let account = AccountHandler::new(self.store()).open(owner).await.unwrap();
            if amount > Decimal::ZERO {
                DepositHandler::new(self.store())
                    .execute(DepositCommand::new(account.id, amount))
                    .await
                    .unwrap();
            }
            account.id
        }
    }

    fn domain_err(err: AppError) -> DomainError {
        match err {
            AppError::Domain(e) => e,
            other => panic!("expected domain error, got {:?}", other),
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    #[tokio::test]
    async fn test_open_account_starts_at_zero() {
        let fx = Fixture::new();
        let owner = Uuid::new_v4();
        let handler = AccountHandler::new(fx.store());

        let account = handler.open(owner).await.unwrap();
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.owner_id, owner);

        let listed = handler.list(owner).await.unwrap();
        assert_eq!(listed, vec![account]);
        assert!(handler.list(Uuid::new_v4()).await.unwrap().is_empty());
    }

    // =========================================================================
    // Deposit / Withdraw
    // =========================================================================

    #[tokio::test]
    async fn test_deposit_writes_positive_entry() {
        let fx = Fixture::new();
        let account = fx.funded_account(Uuid::new_v4(), Decimal::ZERO).await;

        let entry = DepositHandler::new(fx.store())
            .execute(DepositCommand::new(account, dec!(100)))
            .await
            .unwrap();

        assert_eq!(entry.amount, dec!(100));
        assert_eq!(entry.kind, EntryKind::Deposit);
        assert_eq!(entry.to_account, Some(account));
        assert_eq!(entry.from_account, None);

        let stored = fx.store.find_account(account).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(100));
    }

    #[tokio::test]
    async fn test_deposit_rejects_bad_amounts() {
        let fx = Fixture::new();
        let account = fx.funded_account(Uuid::new_v4(), Decimal::ZERO).await;
        let handler = DepositHandler::new(fx.store());

        for amount in [dec!(0), dec!(-5), dec!(1.001)] {
            let err = handler
                .execute(DepositCommand::new(account, amount))
                .await
                .unwrap_err();
            assert!(matches!(domain_err(err), DomainError::InvalidArgument(_)));
        }
        assert!(fx.store.all_entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deposit_to_missing_account() {
        let fx = Fixture::new();
        let missing = Uuid::new_v4();

        let err = DepositHandler::new(fx.store())
            .execute(DepositCommand::new(missing, dec!(10)))
            .await
            .unwrap_err();
        assert_eq!(domain_err(err), DomainError::AccountNotFound(missing));
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds_leaves_balance() {
        let fx = Fixture::new();
        let owner = Uuid::new_v4();
        let account = fx.funded_account(owner, dec!(50)).await;

        let err = WithdrawHandler::new(fx.store())
            .execute(WithdrawCommand::new(account, owner, dec!(80)))
            .await
            .unwrap_err();

        assert_eq!(
            domain_err(err),
            DomainError::insufficient_funds(dec!(80), dec!(50))
        );
        let stored = fx.store.find_account(account).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(50));
        assert_eq!(fx.store.all_entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_withdraw_requires_ownership() {
        let fx = Fixture::new();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let account = fx.funded_account(owner, dec!(50)).await;

        let err = WithdrawHandler::new(fx.store())
            .execute(WithdrawCommand::new(account, intruder, dec!(10)))
            .await
            .unwrap_err();

        assert!(matches!(domain_err(err), DomainError::Forbidden { .. }));
        let stored = fx.store.find_account(account).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(50));
    }

    #[tokio::test]
    async fn test_withdraw_exact_balance_reaches_zero() {
        let fx = Fixture::new();
        let owner = Uuid::new_v4();
        let account = fx.funded_account(owner, dec!(50)).await;

        let entry = WithdrawHandler::new(fx.store())
            .execute(WithdrawCommand::new(account, owner, dec!(50)))
            .await
            .unwrap();

        assert_eq!(entry.amount, dec!(-50));
        assert_eq!(entry.from_account, Some(account));
        let stored = fx.store.find_account(account).await.unwrap().unwrap();
        assert_eq!(stored.balance, Decimal::ZERO);
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    #[tokio::test]
    async fn test_transfer_moves_money_with_two_legs() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        let from = fx.funded_account(alice, dec!(100)).await;
        let to = fx.funded_account(Uuid::new_v4(), Decimal::ZERO).await;

        let result = TransferHandler::new(fx.store())
            .execute(TransferCommand::new(from, to, alice, dec!(30)))
            .await
            .unwrap();

        assert_eq!(result.debit.amount, dec!(-30));
        assert_eq!(result.credit.amount, dec!(30));
        assert_eq!(result.debit.journal_id, result.credit.journal_id);
        assert_eq!(result.debit.kind, EntryKind::Transfer);

        let from_acc = fx.store.find_account(from).await.unwrap().unwrap();
        let to_acc = fx.store.find_account(to).await.unwrap().unwrap();
        assert_eq!(from_acc.balance, dec!(70));
        assert_eq!(to_acc.balance, dec!(30));
    }

    #[tokio::test]
    async fn test_transfer_rejections_change_nothing() {
        let fx = Fixture::new();
        let alice = Uuid::new_v4();
        let from = fx.funded_account(alice, dec!(100)).await;
        let to = fx.funded_account(Uuid::new_v4(), Decimal::ZERO).await;
        let handler = TransferHandler::new(fx.store());

        let err = handler
            .execute(TransferCommand::new(from, from, alice, dec!(10)))
            .await
            .unwrap_err();
        assert_eq!(domain_err(err), DomainError::SameAccountTransfer);

        let err = handler
            .execute(TransferCommand::new(from, to, alice, dec!(150)))
            .await
            .unwrap_err();
        assert!(matches!(
            domain_err(err),
            DomainError::InsufficientFunds { .. }
        ));

        let err = handler
            .execute(TransferCommand::new(from, to, Uuid::new_v4(), dec!(10)))
            .await
            .unwrap_err();
        assert!(matches!(domain_err(err), DomainError::Forbidden { .. }));

        let err = handler
            .execute(TransferCommand::new(from, Uuid::new_v4(), alice, dec!(10)))
            .await
            .unwrap_err();
        assert!(matches!(domain_err(err), DomainError::AccountNotFound(_)));

        assert_eq!(fx.store.total_balance().unwrap(), dec!(100));
        assert_eq!(fx.store.all_entries().unwrap().len(), 1);
    }

    // =========================================================================
    // Credits
    // =========================================================================

    #[tokio::test]
    async fn test_issue_credit_persists_schedule() {
        let fx = Fixture::new();
        let account = fx.funded_account(Uuid::new_v4(), Decimal::ZERO).await;
        let handler = CreditHandler::new(fx.store(), fx.clock());

        let issued = handler
            .issue(IssueCreditCommand::new(account, dec!(1200), dec!(12), 12))
            .await
            .unwrap();

        assert_eq!(issued.credit.monthly_payment, dec!(106.62));
        assert_eq!(issued.schedule.len(), 12);
        assert!(issued.schedule.iter().all(|e| e.amount == dec!(106.62)));
        assert!(issued.schedule.iter().all(|e| !e.paid && e.penalty == Decimal::ZERO));
        assert_eq!(
            issued.schedule[0].due_date,
            NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()
        );
        assert_eq!(
            issued.schedule[11].due_date,
            NaiveDate::from_ymd_opt(2027, 1, 15).unwrap()
        );

        let schedule = handler.schedule(issued.credit.id).await.unwrap();
        assert_eq!(schedule, issued.schedule);
    }

    #[tokio::test]
    async fn test_issue_credit_rejects_bad_terms() {
        let fx = Fixture::new();
        let account = fx.funded_account(Uuid::new_v4(), Decimal::ZERO).await;
        let handler = CreditHandler::new(fx.store(), fx.clock());

        for cmd in [
            IssueCreditCommand::new(account, dec!(0), dec!(12), 12),
            IssueCreditCommand::new(account, dec!(1000), dec!(-1), 12),
            IssueCreditCommand::new(account, dec!(1000), dec!(12), 0),
        ] {
            let err = handler.issue(cmd).await.unwrap_err();
            assert!(matches!(domain_err(err), DomainError::InvalidArgument(_)));
        }

        let missing = Uuid::new_v4();
        let err = handler
            .issue(IssueCreditCommand::new(missing, dec!(1000), dec!(12), 12))
            .await
            .unwrap_err();
        assert_eq!(domain_err(err), DomainError::AccountNotFound(missing));
    }

    #[tokio::test]
    async fn test_schedule_for_unknown_credit() {
        let fx = Fixture::new();
        let missing = Uuid::new_v4();

        let err = CreditHandler::new(fx.store(), fx.clock())
            .schedule(missing)
            .await
            .unwrap_err();
        assert_eq!(domain_err(err), DomainError::CreditNotFound(missing));
    }

    // =========================================================================
    // Forecast
    // =========================================================================

    #[tokio::test]
    async fn test_predict_balance_counts_installments_within_horizon() {
        let fx = Fixture::new();
        let owner = Uuid::new_v4();
        let account = fx.funded_account(owner, dec!(500)).await;
        CreditHandler::new(fx.store(), fx.clock())
            .issue(IssueCreditCommand::new(account, dec!(1200), dec!(12), 12))
            .await
            .unwrap();

        let handler = PredictBalanceHandler::new(fx.store(), fx.clock());

        // 2026-01-15 + 31 days = 2026-02-15, the first due date
        let forecast = handler
            .execute(PredictBalanceQuery::new(account, owner, 31))
            .await
            .unwrap();
        assert_eq!(forecast.current, dec!(500));
        assert_eq!(forecast.total_scheduled, dec!(106.62));
        assert_eq!(forecast.projected, dec!(393.38));

        let forecast = handler
            .execute(PredictBalanceQuery::new(account, owner, 30))
            .await
            .unwrap();
        assert_eq!(forecast.total_scheduled, Decimal::ZERO);
        assert_eq!(forecast.projected, dec!(500));

        // Projection may go negative
        let forecast = handler
            .execute(PredictBalanceQuery::new(account, owner, 365))
            .await
            .unwrap();
        assert_eq!(forecast.total_scheduled, dec!(1279.44));
        assert_eq!(forecast.projected, dec!(-779.44));
    }

    #[tokio::test]
    async fn test_predict_balance_validates_horizon_and_owner() {
        let fx = Fixture::new();
        let owner = Uuid::new_v4();
        let account = fx.funded_account(owner, dec!(10)).await;
        let handler = PredictBalanceHandler::new(fx.store(), fx.clock());

        for days in [0, 366] {
            let err = handler
                .execute(PredictBalanceQuery::new(account, owner, days))
                .await
                .unwrap_err();
            assert!(matches!(domain_err(err), DomainError::InvalidArgument(_)));
        }

        let err = handler
            .execute(PredictBalanceQuery::new(account, Uuid::new_v4(), 30))
            .await
            .unwrap_err();
        assert!(matches!(domain_err(err), DomainError::Forbidden { .. }));
    }
}
