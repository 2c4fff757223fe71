//! Wallet ledger engine tests: balance arithmetic, atomicity of the row-pair writes, idempotent
//! finalization and integrity replay.
use laundry_payment_engine::{
    db_types::{Fils, NewWalletTransaction, WalletTxStatus, WalletTxType},
    test_utils::prepare_env::new_test_db,
    traits::{FinalizeOutcome, PaymentLedgerDatabase, PaymentLedgerError},
    WalletApi,
};
use rand::Rng;

#[tokio::test]
async fn deposits_and_withdrawals_chain() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    let t1 = api
        .apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(5_000), None, None, None)
        .await
        .unwrap();
    assert_eq!(t1.balance_before, Fils::zero());
    assert_eq!(t1.balance_after, Fils::from(5_000));
    assert_eq!(t1.status, WalletTxStatus::Completed);
    let t2 = api
        .apply_transaction("cust-1", WalletTxType::Payment, Fils::from(1_250), None, None, None)
        .await
        .unwrap();
    assert_eq!(t2.balance_before, Fils::from(5_000));
    assert_eq!(t2.balance_after, Fils::from(3_750));
    assert_eq!(api.balance("cust-1").await.unwrap(), Fils::from(3_750));
    let report = api.verify_integrity("cust-1").await.unwrap();
    assert_eq!(report.transaction_count, 2);
    assert_eq!(report.replayed_balance, Fils::from(3_750));
}

#[tokio::test]
async fn insufficient_balance_is_rejected() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    api.apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(1_000), None, None, None).await.unwrap();
    let err = api
        .apply_transaction("cust-1", WalletTxType::Withdrawal, Fils::from(1_001), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentLedgerError::InsufficientBalance { .. }));
    // The failed attempt must leave no trace on the balance
    assert_eq!(api.balance("cust-1").await.unwrap(), Fils::from(1_000));
    assert_eq!(api.history("cust-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn negative_amounts_are_rejected() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    let err = api
        .apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(-5), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentLedgerError::ValidationError(_)));
}

#[tokio::test]
async fn adjustment_sets_the_balance_directly() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    api.apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(9_000), None, None, None).await.unwrap();
    let adj = api
        .apply_transaction(
            "cust-1",
            WalletTxType::Adjustment,
            Fils::from(2_500),
            Some("support ticket 1042".to_string()),
            Some("ticket:1042".to_string()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(adj.balance_before, Fils::from(9_000));
    assert_eq!(adj.balance_after, Fils::from(2_500));
    assert_eq!(api.balance("cust-1").await.unwrap(), Fils::from(2_500));
    // The replay must accept the adjustment as a legal discontinuity
    assert!(api.verify_integrity("cust-1").await.is_ok());
}

#[tokio::test]
async fn pending_reservation_moves_no_money_until_completed() {
    let db = new_test_db().await;
    let wallet = db.fetch_or_create_wallet("cust-1").await.unwrap();
    let reservation = db
        .reserve_wallet_transaction(NewWalletTransaction::new(wallet.id, WalletTxType::Deposit, Fils::from(7_000)))
        .await
        .unwrap();
    assert_eq!(reservation.status, WalletTxStatus::Pending);
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::zero());

    let outcome = db.finalize_wallet_transaction(reservation.id, WalletTxStatus::Completed).await.unwrap();
    assert!(outcome.was_applied());
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::from(7_000));
}

#[tokio::test]
async fn double_finalization_credits_exactly_once() {
    let db = new_test_db().await;
    let wallet = db.fetch_or_create_wallet("cust-1").await.unwrap();
    let reservation = db
        .reserve_wallet_transaction(NewWalletTransaction::new(wallet.id, WalletTxType::Deposit, Fils::from(4_000)))
        .await
        .unwrap();
    let first = db.finalize_wallet_transaction(reservation.id, WalletTxStatus::Completed).await.unwrap();
    assert!(first.was_applied());
    // A duplicate webhook delivery finalizes the same transaction again
    let second = db.finalize_wallet_transaction(reservation.id, WalletTxStatus::Completed).await.unwrap();
    assert!(matches!(second, FinalizeOutcome::AlreadyFinal(WalletTxStatus::Completed)));
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::from(4_000));
    assert!(db.verify_wallet_integrity("cust-1").await.is_ok());
}

#[tokio::test]
async fn failed_finalization_moves_no_money() {
    let db = new_test_db().await;
    let wallet = db.fetch_or_create_wallet("cust-1").await.unwrap();
    let reservation = db
        .reserve_wallet_transaction(NewWalletTransaction::new(wallet.id, WalletTxType::Deposit, Fils::from(4_000)))
        .await
        .unwrap();
    let outcome = db.finalize_wallet_transaction(reservation.id, WalletTxStatus::Failed).await.unwrap();
    assert!(outcome.was_applied());
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::zero());
    // And it cannot later be flipped to Completed
    let again = db.finalize_wallet_transaction(reservation.id, WalletTxStatus::Completed).await.unwrap();
    assert!(matches!(again, FinalizeOutcome::AlreadyFinal(WalletTxStatus::Failed)));
    assert_eq!(db.fetch_wallet("cust-1").await.unwrap().unwrap().balance, Fils::zero());
}

#[tokio::test]
async fn ledger_conservation_over_random_sequences() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    let mut rng = rand::thread_rng();
    let mut expected = 0i64;
    for _ in 0..200 {
        let amount = rng.gen_range(1..=10_000i64);
        match rng.gen_range(0..5) {
            0 | 1 => {
                api.apply_transaction("cust-f", WalletTxType::Deposit, Fils::from(amount), None, None, None)
                    .await
                    .unwrap();
                expected += amount;
            },
            2 => {
                api.apply_transaction("cust-f", WalletTxType::Refund, Fils::from(amount), None, None, None)
                    .await
                    .unwrap();
                expected += amount;
            },
            3 if expected > 0 => {
                let spend = rng.gen_range(1..=expected);
                api.apply_transaction("cust-f", WalletTxType::Payment, Fils::from(spend), None, None, None)
                    .await
                    .unwrap();
                expected -= spend;
            },
            4 if expected > 0 => {
                let spend = rng.gen_range(1..=expected);
                api.apply_transaction("cust-f", WalletTxType::Withdrawal, Fils::from(spend), None, None, None)
                    .await
                    .unwrap();
                expected -= spend;
            },
            _ => {},
        }
    }
    assert_eq!(api.balance("cust-f").await.unwrap(), Fils::from(expected));
    let report = api.verify_integrity("cust-f").await.unwrap();
    assert_eq!(report.replayed_balance, Fils::from(expected));
    assert_eq!(report.stored_balance, Fils::from(expected));
}

#[tokio::test]
async fn corruption_is_detected_and_halts_the_wallet() {
    let db = new_test_db().await;
    let api = WalletApi::new(db.clone());
    api.apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(5_000), None, None, None).await.unwrap();
    api.apply_transaction("cust-1", WalletTxType::Payment, Fils::from(2_000), None, None, None).await.unwrap();
    // Corrupt the ledger behind the engine's back
    sqlx::query("UPDATE wallet_transactions SET balance_after = balance_after + 100 WHERE id = 1")
        .execute(db.pool())
        .await
        .unwrap();
    let err = api.verify_integrity("cust-1").await.unwrap_err();
    assert!(matches!(err, PaymentLedgerError::IntegrityError(_)));
    // The wallet is now out of automatic circulation
    let err = api
        .apply_transaction("cust-1", WalletTxType::Deposit, Fils::from(1), None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentLedgerError::WalletInactive(_)));
}
