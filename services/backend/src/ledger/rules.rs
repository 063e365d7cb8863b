//! Balance arithmetic for every ledger operation
//!
//! Each planner takes the balance read under the user's lock and returns the
//! complete [`LedgerCommit`] to apply, or the business-rule error that leaves
//! state untouched. Planners never read storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{to_currency_scale, SxAmount};
use uuid::Uuid;

use crate::domain::{Balance, Transaction, TransactionData, TransactionKind, WithdrawalStatus};
use crate::errors::{AppError, Result};
use crate::repository::{LedgerCommit, WithdrawalTransition};

/// Plan a settled game play
///
/// Writes a `bet` entry with the pre-payout snapshot, then a `win` (or a
/// zero `loss`) entry with the final total. Both carry the same game data.
/// Earned balance grows by the winnings and is capped at the new total.
pub fn plan_settlement(
    balance: &Balance,
    bet: SxAmount,
    winnings: SxAmount,
    game_data: &TransactionData,
    now: DateTime<Utc>,
) -> Result<LedgerCommit> {
    if bet.is_zero() {
        return Err(AppError::InvalidBet(
            "Bet amount must be greater than zero".to_string(),
        ));
    }

    let after_bet = balance
        .total_balance
        .checked_sub(bet)
        .map_err(|_| AppError::InsufficientFunds {
            required: bet,
            available: balance.total_balance,
        })?;

    // Plays are ceiling-checked before the draw; reaching this means a
    // concurrent credit moved the total after that check.
    let new_total = after_bet.checked_add(winnings).map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "Payout {} would exceed the balance ceiling",
            winnings
        ))
    })?;

    let new_earned = if winnings.is_positive() {
        let grown = balance.earned_balance.as_decimal() + winnings.as_decimal();
        capped_earned(grown, new_total)?
    } else {
        capped_earned(balance.earned_balance.as_decimal(), new_total)?
    };

    let bet_entry = entry(
        balance,
        TransactionKind::Bet,
        bet.as_debit(),
        after_bet,
        Some(game_data.clone()),
        now,
    );
    let payout_entry = if winnings.is_positive() {
        entry(
            balance,
            TransactionKind::Win,
            winnings.as_decimal(),
            new_total,
            Some(game_data.clone()),
            now,
        )
    } else {
        entry(
            balance,
            TransactionKind::Loss,
            Decimal::ZERO,
            new_total,
            Some(game_data.clone()),
            now,
        )
    };

    Ok(LedgerCommit {
        total_balance: new_total,
        earned_balance: new_earned,
        updated_at: now,
        transactions: vec![bet_entry, payout_entry],
        withdrawal: None,
    })
}

/// Plan an admin grant; credited to both total and earned
pub fn plan_bonus(
    balance: &Balance,
    amount: SxAmount,
    source: &str,
    now: DateTime<Utc>,
) -> Result<LedgerCommit> {
    if amount.is_zero() {
        return Err(AppError::InvalidAmount(
            "Bonus amount must be greater than zero".to_string(),
        ));
    }

    let new_total = balance.total_balance.checked_add(amount).map_err(|_| {
        AppError::InvalidAmount(format!("Bonus {} would exceed the balance ceiling", amount))
    })?;
    let new_earned = balance.earned_balance.checked_add(amount).map_err(|_| {
        AppError::InvalidAmount(format!("Bonus {} would exceed the balance ceiling", amount))
    })?;

    Ok(LedgerCommit {
        total_balance: new_total,
        earned_balance: new_earned,
        updated_at: now,
        transactions: vec![entry(
            balance,
            TransactionKind::Bonus,
            amount.as_decimal(),
            new_total,
            Some(TransactionData::Bonus {
                source: source.to_string(),
            }),
            now,
        )],
        withdrawal: None,
    })
}

/// Plan a withdrawal debit against the balance as it stands now
///
/// The amount must be covered by the earned balance at this moment, not at
/// the time a request was filed.
pub fn plan_withdrawal_debit(
    balance: &Balance,
    amount: SxAmount,
    request_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<LedgerCommit> {
    if amount.is_zero() {
        return Err(AppError::InvalidAmount(
            "Withdrawal amount must be greater than zero".to_string(),
        ));
    }

    let insufficient = || AppError::InsufficientEarnedBalance {
        required: amount,
        available: balance.earned_balance.min(balance.total_balance),
    };
    let new_earned = balance
        .earned_balance
        .checked_sub(amount)
        .map_err(|_| insufficient())?;
    let new_total = balance
        .total_balance
        .checked_sub(amount)
        .map_err(|_| insufficient())?;

    let commit = LedgerCommit {
        total_balance: new_total,
        earned_balance: new_earned,
        updated_at: now,
        transactions: vec![entry(
            balance,
            TransactionKind::Withdrawal,
            amount.as_debit(),
            new_total,
            Some(TransactionData::Withdrawal {
                request_id,
                status: WithdrawalStatus::Approved,
            }),
            now,
        )],
        withdrawal: None,
    };

    Ok(match request_id {
        Some(request_id) => commit.with_transition(WithdrawalTransition {
            request_id,
            status: WithdrawalStatus::Approved,
            processed_at: now,
        }),
        None => commit,
    })
}

/// Plan a rejection: a zero-amount audit entry and the terminal transition
pub fn plan_withdrawal_rejection(
    balance: &Balance,
    request_id: Uuid,
    now: DateTime<Utc>,
) -> LedgerCommit {
    LedgerCommit {
        total_balance: balance.total_balance,
        earned_balance: balance.earned_balance,
        updated_at: now,
        transactions: vec![entry(
            balance,
            TransactionKind::Withdrawal,
            Decimal::ZERO,
            balance.total_balance,
            Some(TransactionData::Withdrawal {
                request_id: Some(request_id),
                status: WithdrawalStatus::Rejected,
            }),
            now,
        )],
        withdrawal: Some(WithdrawalTransition {
            request_id,
            status: WithdrawalStatus::Rejected,
            processed_at: now,
        }),
    }
}

fn capped_earned(earned: Decimal, total: SxAmount) -> Result<SxAmount> {
    SxAmount::new(earned.min(total.as_decimal()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("earned balance out of range: {}", e)))
}

fn entry(
    balance: &Balance,
    kind: TransactionKind,
    amount: Decimal,
    balance_after: SxAmount,
    game_data: Option<TransactionData>,
    now: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        user_id: balance.user_id.clone(),
        kind,
        game_type: game_data.as_ref().and_then(TransactionData::game_type),
        amount: to_currency_scale(amount),
        balance_after,
        game_data,
        created_at: now,
    }
}
