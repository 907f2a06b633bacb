mod common;

use anyhow::Result;
use common::{open_account, open_funded_account, test_service};
use ledgerbank::application::AppError;
use ledgerbank::domain::{compute_analytics, replay_balance, TransactionKind};

#[tokio::test]
async fn test_full_scenario() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // X starts with balance 1000, Y with 0
    let mut x = open_funded_account(&service, "Xavier", "1111", 1000).await?;
    let y = open_account(&service, "Yvonne", "2222").await?;

    // deposit 500 -> 1500
    let balance = service.deposit(&mut x, "500").await?;
    assert_eq!(balance, 1500);
    let history = service.transaction_history(&x, None).await?;
    assert_eq!(history[0].kind, TransactionKind::Deposit);
    assert_eq!(history[0].amount, 500);

    // withdraw 300 -> 1200
    let balance = service.withdraw(&mut x, "300").await?;
    assert_eq!(balance, 1200);
    let history = service.transaction_history(&x, None).await?;
    assert_eq!(history[0].kind, TransactionKind::Withdraw);
    assert_eq!(history[0].amount, 300);

    // transfer 200 to Y -> X 1000, Y 200
    service.transfer(&mut x, &y.account_number, "200").await?;
    assert_eq!(x.balance, 1000);
    assert_eq!(service.account_info(&y).await?.balance, 200);

    Ok(())
}

#[tokio::test]
async fn test_deposit_then_withdraw_restores_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut alice = open_funded_account(&service, "Alice", "1234", 700).await?;

    service.deposit(&mut alice, "250").await?;
    service.withdraw(&mut alice, "250").await?;

    assert_eq!(alice.balance, 700);
    // Funding deposit plus exactly two more records
    assert_eq!(service.transaction_history(&alice, None).await?.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_deposit_overflow_is_a_typed_error() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut alice = open_account(&service, "Alice", "1234").await?;
    service.deposit(&mut alice, &i64::MAX.to_string()).await?;

    // One more unit would overflow the balance; it must fail cleanly
    let result = service.deposit(&mut alice, "1").await;
    assert!(matches!(result, Err(AppError::BalanceOverflow)));

    assert_eq!(service.account_info(&alice).await?.balance, i64::MAX);
    assert_eq!(alice.balance, i64::MAX);
    assert_eq!(service.transaction_history(&alice, None).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_withdraw_insufficient_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut alice = open_funded_account(&service, "Alice", "1234", 100).await?;

    let result = service.withdraw(&mut alice, "200").await;
    assert!(matches!(
        result,
        Err(AppError::InsufficientBalance {
            balance: 100,
            required: 200
        })
    ));
    assert_eq!(service.account_info(&alice).await?.balance, 100);

    Ok(())
}

#[tokio::test]
async fn test_balance_equals_replayed_audit_trail() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut alice = open_funded_account(&service, "Alice", "1234", 1000).await?;
    let mut bob = open_funded_account(&service, "Bob", "4321", 500).await?;

    service.deposit(&mut alice, "300").await?;
    service.withdraw(&mut alice, "150").await?;
    service.transfer(&mut alice, &bob.account_number, "400").await?;
    service.transfer(&mut bob, &alice.account_number, "50").await?;

    for session in [&alice, &bob] {
        let account = service.account_info(session).await?;
        let history = service.transaction_history(session, None).await?;
        // Accounts open with balance 0, so replaying the full trail
        // must reproduce the stored balance exactly.
        assert_eq!(replay_balance(&history), account.balance);
        assert!(account.balance >= 0);
    }

    Ok(())
}

#[tokio::test]
async fn test_history_is_newest_first_and_bounded() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut alice = open_account(&service, "Alice", "1234").await?;

    for amount in ["10", "20", "30", "40", "50"] {
        service.deposit(&mut alice, amount).await?;
    }

    let history = service.transaction_history(&alice, None).await?;
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].amount, 50);
    assert_eq!(history[4].amount, 10);
    for pair in history.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    let bounded = service.transaction_history(&alice, Some(2)).await?;
    assert_eq!(bounded.len(), 2);
    assert_eq!(bounded[0].amount, 50);
    assert_eq!(bounded[1].amount, 40);

    Ok(())
}

#[tokio::test]
async fn test_analytics_aggregates_all_kinds() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut alice = open_funded_account(&service, "Alice", "1234", 1000).await?;
    let mut bob = open_funded_account(&service, "Bob", "4321", 500).await?;

    service.withdraw(&mut alice, "200").await?;
    service.transfer(&mut alice, &bob.account_number, "300").await?;
    service.transfer(&mut bob, &alice.account_number, "100").await?;

    let analytics = service.analytics(&alice).await?;
    // income: 1000 funding deposit + 100 transfer in
    assert_eq!(analytics.income, 1100);
    // expense: 200 withdrawal + 300 transfer out
    assert_eq!(analytics.expense, 500);

    // SQL aggregation agrees with the in-memory fold
    let history = service.transaction_history(&alice, None).await?;
    assert_eq!(compute_analytics(&history), analytics);

    // A pure read: running it twice changes nothing
    assert_eq!(service.analytics(&alice).await?, analytics);

    Ok(())
}
