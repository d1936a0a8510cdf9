//! Ledger properties against the in-memory store
//!
//! Conservation, non-negativity under contention, the transfer scenarios
//! and amount boundaries.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use billing_ledger::domain::{DomainError, EntryKind};
use billing_ledger::handlers::{
    CreditHandler, DepositCommand, DepositHandler, IssueCreditCommand, TransferCommand,
    TransferHandler, WithdrawCommand, WithdrawHandler,
};
use billing_ledger::store::LedgerStore;
use billing_ledger::AppError;

mod common;

use common::TestLedger;

fn domain(err: AppError) -> DomainError {
    err.domain().cloned().unwrap_or_else(|| panic!("expected domain error, got {:?}", err))
}

#[tokio::test]
async fn test_transfers_conserve_total_balance() {
    let ledger = TestLedger::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let a = ledger.account_with_balance(alice, Decimal::ZERO).await;
    let b = ledger.account_with_balance(bob, Decimal::ZERO).await;

    let deposits = DepositHandler::new(ledger.store());
    let withdrawals = WithdrawHandler::new(ledger.store());
    let transfers = TransferHandler::new(ledger.store());

    deposits.execute(DepositCommand::new(a, dec!(500))).await.unwrap();
    deposits.execute(DepositCommand::new(b, dec!(120.55))).await.unwrap();
    let mut net = dec!(620.55);
    assert_eq!(ledger.store.total_balance().unwrap(), net);

    for (from, to, owner, amount) in [
        (a, b, alice, dec!(75.25)),
        (b, a, bob, dec!(10)),
        (a, b, alice, dec!(0.01)),
        (b, a, bob, dec!(185.79)),
    ] {
        transfers
            .execute(TransferCommand::new(from, to, owner, amount))
            .await
            .unwrap();
        assert_eq!(ledger.store.total_balance().unwrap(), net);
    }

    withdrawals
        .execute(WithdrawCommand::new(a, alice, dec!(100)))
        .await
        .unwrap();
    net -= dec!(100);
    assert_eq!(ledger.store.total_balance().unwrap(), net);

    // Balances are derivable from the log
    let entries = ledger.store.all_entries().unwrap();
    for account in [a, b] {
        let from_log: Decimal = entries
            .iter()
            .filter(|e| e.account_id() == Some(account))
            .map(|e| e.amount)
            .sum();
        assert_eq!(from_log, ledger.balance(account).await);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_never_overdraw() {
    let ledger = TestLedger::new();
    let owner = Uuid::new_v4();
    let account = ledger.account_with_balance(owner, dec!(100)).await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let handler = WithdrawHandler::new(ledger.store());
            tokio::spawn(async move {
                handler
                    .execute(WithdrawCommand::new(account, owner, dec!(30)))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => {
                assert!(matches!(domain(err), DomainError::InsufficientFunds { .. }));
                rejected += 1;
            }
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(rejected, 7);
    assert_eq!(ledger.balance(account).await, dec!(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opposing_transfers_stay_consistent() {
    let ledger = TestLedger::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let a = ledger.account_with_balance(alice, dec!(50)).await;
    let b = ledger.account_with_balance(bob, dec!(50)).await;

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let handler = TransferHandler::new(ledger.store());
            let command = if i % 2 == 0 {
                TransferCommand::new(a, b, alice, dec!(20))
            } else {
                TransferCommand::new(b, a, bob, dec!(20))
            };
            tokio::spawn(async move { handler.execute(command).await })
        })
        .collect();

    for task in tasks {
        if let Err(err) = task.await.unwrap() {
            assert!(matches!(domain(err), DomainError::InsufficientFunds { .. }));
        }
    }

    assert_eq!(ledger.store.total_balance().unwrap(), dec!(100));
    assert!(ledger.balance(a).await >= Decimal::ZERO);
    assert!(ledger.balance(b).await >= Decimal::ZERO);

    let transfer_legs = ledger
        .store
        .all_entries()
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == EntryKind::Transfer)
        .count();
    assert_eq!(transfer_legs % 2, 0);
}

#[tokio::test]
async fn test_transfer_scenario_success() {
    let ledger = TestLedger::new();
    let alice = Uuid::new_v4();
    let a = ledger.account_with_balance(alice, dec!(100)).await;
    let b = ledger.account_with_balance(Uuid::new_v4(), Decimal::ZERO).await;
    let before = ledger.store.all_entries().unwrap().len();

    let result = TransferHandler::new(ledger.store())
        .execute(TransferCommand::new(a, b, alice, dec!(80)))
        .await
        .unwrap();

    assert_eq!(ledger.balance(a).await, dec!(20));
    assert_eq!(ledger.balance(b).await, dec!(80));

    let entries = ledger.store.all_entries().unwrap();
    assert_eq!(entries.len(), before + 2);
    assert_eq!(result.debit.amount, -result.credit.amount);
    assert_eq!(result.debit.from_account, Some(a));
    assert_eq!(result.credit.to_account, Some(b));
}

#[tokio::test]
async fn test_transfer_scenario_insufficient_funds() {
    let ledger = TestLedger::new();
    let alice = Uuid::new_v4();
    let a = ledger.account_with_balance(alice, dec!(100)).await;
    let b = ledger.account_with_balance(Uuid::new_v4(), Decimal::ZERO).await;
    let before = ledger.store.all_entries().unwrap().len();

    let err = TransferHandler::new(ledger.store())
        .execute(TransferCommand::new(a, b, alice, dec!(150)))
        .await
        .unwrap_err();

    assert_eq!(
        domain(err),
        DomainError::insufficient_funds(dec!(150), dec!(100))
    );
    assert_eq!(ledger.balance(a).await, dec!(100));
    assert_eq!(ledger.balance(b).await, Decimal::ZERO);
    assert_eq!(ledger.store.all_entries().unwrap().len(), before);
}

#[tokio::test]
async fn test_non_positive_amounts_rejected_before_storage() {
    let ledger = TestLedger::new();
    let owner = Uuid::new_v4();
    let a = ledger.account_with_balance(owner, dec!(10)).await;
    let b = ledger.account_with_balance(Uuid::new_v4(), Decimal::ZERO).await;

    for amount in [Decimal::ZERO, dec!(-1), dec!(-0.01)] {
        let err = DepositHandler::new(ledger.store())
            .execute(DepositCommand::new(a, amount))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidArgument(_)));

        let err = WithdrawHandler::new(ledger.store())
            .execute(WithdrawCommand::new(a, owner, amount))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidArgument(_)));

        let err = TransferHandler::new(ledger.store())
            .execute(TransferCommand::new(a, b, owner, amount))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidArgument(_)));
    }

    assert_eq!(ledger.store.all_entries().unwrap().len(), 1);
}

#[tokio::test]
async fn test_issue_credit_annuity_schedule() {
    let ledger = TestLedger::new();
    let account = ledger.account_with_balance(Uuid::new_v4(), Decimal::ZERO).await;

    let issued = CreditHandler::new(ledger.store(), ledger.clock())
        .issue(IssueCreditCommand::new(account, dec!(1200), dec!(12), 12))
        .await
        .unwrap();

    assert_eq!(issued.schedule.len(), 12);
    assert!(issued
        .schedule
        .iter()
        .all(|entry| entry.amount == dec!(106.62) && !entry.paid));
    assert_eq!(issued.credit.monthly_payment, dec!(106.62));

    let stored = ledger.store.schedule_for_credit(issued.credit.id).await.unwrap();
    assert_eq!(stored.len(), 12);

    // Issuance moves no money
    assert_eq!(ledger.balance(account).await, Decimal::ZERO);
}
