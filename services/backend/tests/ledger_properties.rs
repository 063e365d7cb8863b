/// Ledger invariants exercised through the public services on the in-memory store
mod common;

use common::{sx, TestContext};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use casino_backend::domain::{
    ChoiceInput, GameType, TransactionData, TransactionKind, WithdrawalStatus,
};
use casino_backend::errors::AppError;

fn text(choice: &str) -> ChoiceInput {
    ChoiceInput::Text(choice.to_string())
}

async fn assert_conserved(ctx: &TestContext, user_id: &str) {
    let balance = ctx.ledger().balance(user_id).await.unwrap();
    let transactions = ctx.ledger().store().all_transactions(user_id).await.unwrap();
    let sum: Decimal = transactions.iter().map(|t| t.amount).sum();
    assert_eq!(
        balance.total_balance.as_decimal(),
        dec!(5.00) + sum,
        "total must equal the signup bonus plus every ledger amount"
    );
    assert!(balance.earned_balance <= balance.total_balance);

    let report = ctx.ledger().audit(user_id).await.unwrap();
    assert!(report.balanced);
    assert!(report.snapshots_consistent);
    assert_eq!(report.transaction_count, transactions.len());
}

#[tokio::test]
async fn test_balance_is_conserved_across_mixed_operations() {
    let ctx = TestContext::new();
    ctx.funded_user("alice", dec!(20)).await;

    // tails wins, heads loses, dice 4 (draw 3) wins, roulette pocket 1 is red
    ctx.force_draws([1, 0, 3, 1]);
    let games = &ctx.state.games;
    games.play("alice", GameType::CoinFlip, dec!(2.50), &text("tails")).await.unwrap();
    games.play("alice", GameType::CoinFlip, dec!(1.25), &text("tails")).await.unwrap();
    games.play("alice", GameType::DiceRoll, dec!(1), &ChoiceInput::Number(4)).await.unwrap();
    games.play("alice", GameType::Roulette, dec!(3), &text("black")).await.unwrap();

    let request = ctx.state.withdrawals.request_withdrawal("alice", dec!(10)).await.unwrap();
    ctx.state.withdrawals.approve(request.id).await.unwrap();
    let request = ctx.state.withdrawals.request_withdrawal("alice", dec!(10)).await.unwrap();
    ctx.state.withdrawals.reject(request.id).await.unwrap();

    assert_conserved(&ctx, "alice").await;
}

#[tokio::test]
async fn test_balance_never_goes_negative() {
    let ctx = TestContext::new();
    ctx.funded_user("alice", Decimal::ZERO).await;

    ctx.force_draws([1, 1]);
    let outcome = ctx
        .state
        .games
        .play("alice", GameType::CoinFlip, dec!(5.00), &text("heads"))
        .await
        .unwrap();
    assert!(!outcome.won);
    assert!(outcome.new_balance.is_zero());

    let before = ctx.ledger().transactions("alice", 100).await.unwrap().len();
    let err = ctx
        .state
        .games
        .play("alice", GameType::CoinFlip, dec!(0.01), &text("heads"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));

    let after = ctx.ledger().transactions("alice", 100).await.unwrap().len();
    assert_eq!(before, after, "a rejected bet writes nothing");
    assert!(ctx.ledger().balance("alice").await.unwrap().total_balance.is_zero());
    assert_conserved(&ctx, "alice").await;
}

#[tokio::test]
async fn test_insufficient_funds_rejection_is_clean() {
    let ctx = TestContext::new();
    ctx.funded_user("alice", Decimal::ZERO).await;
    ctx.force_draws([0]);

    let err = ctx
        .state
        .games
        .play("alice", GameType::Roulette, dec!(5.01), &text("red"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientFunds { .. }));
    assert!(ctx.ledger().transactions("alice", 20).await.unwrap().is_empty());
    assert_eq!(
        ctx.ledger().balance("alice").await.unwrap().total_balance,
        sx(dec!(5.00))
    );
}

#[tokio::test]
async fn test_concurrent_losing_bets_settle_atomically() {
    let ctx = TestContext::new();
    ctx.funded_user("alice", dec!(5)).await;
    ctx.force_draws(std::iter::repeat(1).take(12));

    let games = Arc::clone(&ctx.state.games);
    let mut handles = Vec::new();
    for _ in 0..12 {
        let games = Arc::clone(&games);
        handles.push(tokio::spawn(async move {
            games
                .play("alice", GameType::CoinFlip, dec!(1.00), &ChoiceInput::Text("heads".into()))
                .await
        }));
    }

    let mut settled = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => settled += 1,
            Err(AppError::InsufficientFunds { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(settled, 10);
    assert_eq!(rejected, 2);
    let balance = ctx.ledger().balance("alice").await.unwrap();
    assert!(balance.total_balance.is_zero());
    assert_eq!(ctx.ledger().transactions("alice", 100).await.unwrap().len(), 21);
    assert_conserved(&ctx, "alice").await;
}

#[tokio::test]
async fn test_concurrent_approvals_debit_once() {
    let ctx = TestContext::new();
    ctx.funded_user("alice", dec!(30)).await;
    let request = ctx.state.withdrawals.request_withdrawal("alice", dec!(12)).await.unwrap();

    let first = ctx.state.withdrawals.clone();
    let second = ctx.state.withdrawals.clone();
    let (a, b) = tokio::join!(first.approve(request.id), second.approve(request.id));

    let results = [a, b];
    let approved = results.iter().filter(|r| r.is_ok()).count();
    let already = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::AlreadyProcessed { .. })))
        .count();
    assert_eq!((approved, already), (1, 1));

    let balance = ctx.ledger().balance("alice").await.unwrap();
    assert_eq!(balance.total_balance.as_decimal(), dec!(23.00));
    assert_eq!(balance.earned_balance.as_decimal(), dec!(18.00));

    let withdrawals: Vec<_> = ctx
        .ledger()
        .transactions("alice", 100)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Withdrawal)
        .collect();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].amount, dec!(-12.00));
    assert_eq!(
        withdrawals[0].game_data,
        Some(TransactionData::Withdrawal {
            request_id: Some(request.id),
            status: WithdrawalStatus::Approved,
        })
    );
    assert_conserved(&ctx, "alice").await;
}

#[tokio::test]
async fn test_forced_draws_pay_by_the_table() {
    let ctx = TestContext::new();
    ctx.funded_user("alice", dec!(95)).await;
    let games = &ctx.state.games;

    // Coin flip: draw 0 is heads, pays 2x
    ctx.force_draws([0]);
    let coin = games.play("alice", GameType::CoinFlip, dec!(10), &text("heads")).await.unwrap();
    assert!(coin.won);
    assert_eq!(coin.winnings, sx(dec!(20)));

    // Dice: draw 2 is face 3, "3" as a string is accepted, pays 6x
    ctx.force_draws([2]);
    let dice = games.play("alice", GameType::DiceRoll, dec!(1), &text("3")).await.unwrap();
    assert!(dice.won);
    assert_eq!(dice.result, "3");
    assert_eq!(dice.winnings, sx(dec!(6)));

    // Roulette: 2 is black, 37 ("00") is green and beats every color
    ctx.force_draws([2, 37]);
    let black = games.play("alice", GameType::Roulette, dec!(4), &text("black")).await.unwrap();
    assert!(black.won);
    assert_eq!(black.winnings, sx(dec!(8)));
    let green = games.play("alice", GameType::Roulette, dec!(4), &text("black")).await.unwrap();
    assert!(!green.won);
    assert_eq!(green.result, "green");

    let balance = ctx.ledger().balance("alice").await.unwrap();
    // 100 + 10 + 5 + 4 - 4
    assert_eq!(balance.total_balance.as_decimal(), dec!(115.00));
    assert_conserved(&ctx, "alice").await;
}

#[tokio::test]
async fn test_losses_keep_earned_until_total_drops_below_it() {
    let ctx = TestContext::new();
    ctx.funded_user("alice", dec!(10)).await;

    ctx.force_draws([1, 1]);
    ctx.state
        .games
        .play("alice", GameType::CoinFlip, dec!(4), &text("heads"))
        .await
        .unwrap();
    let balance = ctx.ledger().balance("alice").await.unwrap();
    assert_eq!(balance.total_balance.as_decimal(), dec!(11.00));
    assert_eq!(balance.earned_balance.as_decimal(), dec!(10.00));

    ctx.state
        .games
        .play("alice", GameType::CoinFlip, dec!(4), &text("heads"))
        .await
        .unwrap();
    let balance = ctx.ledger().balance("alice").await.unwrap();
    assert_eq!(balance.total_balance.as_decimal(), dec!(7.00));
    assert_eq!(balance.earned_balance.as_decimal(), dec!(7.00));
}

#[tokio::test]
async fn test_eligibility_boundary() {
    let ctx = TestContext::new();
    ctx.funded_user("short", dec!(9.99)).await;
    ctx.funded_user("exact", dec!(10.00)).await;

    let err = ctx
        .state
        .withdrawals
        .request_withdrawal("short", dec!(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotEligible { .. }));

    let request = ctx
        .state
        .withdrawals
        .request_withdrawal("exact", dec!(10.00))
        .await
        .unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);

    let err = ctx
        .state
        .withdrawals
        .request_withdrawal("exact", dec!(10.01))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExceedsEarned { .. }));
}

#[tokio::test]
async fn test_open_account_is_idempotent() {
    let ctx = TestContext::new();
    let first = ctx.ledger().open_account("alice").await.unwrap();
    ctx.ledger().credit_bonus("alice", sx(dec!(3)), "promo").await.unwrap();
    let second = ctx.ledger().open_account("alice").await.unwrap();

    assert_eq!(first.total_balance.as_decimal(), dec!(5.00));
    assert_eq!(second.total_balance.as_decimal(), dec!(8.00));
    assert_eq!(ctx.ledger().transactions("alice", 20).await.unwrap().len(), 1);
}
