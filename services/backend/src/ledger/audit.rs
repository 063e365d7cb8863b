use rust_decimal::Decimal;
use shared::SxAmount;

use crate::domain::{AuditReport, Balance, Transaction};

/// Replay a user's transactions (oldest first) against the stored balance
///
/// The running sum starts from the signup credit, since opening an account
/// writes no transaction. Every `balance_after` must equal the running sum
/// right after its own entry.
pub fn replay(opening: SxAmount, transactions: &[Transaction], stored: &Balance) -> AuditReport {
    let mut running = opening.as_decimal();
    let mut snapshots_consistent = true;

    for transaction in transactions {
        running += transaction.amount;
        if transaction.balance_after.as_decimal() != running {
            if snapshots_consistent {
                tracing::warn!(
                    user_id = %stored.user_id,
                    transaction_id = %transaction.id,
                    expected = %running,
                    recorded = %transaction.balance_after.as_decimal(),
                    "Ledger snapshot diverges from replay"
                );
            }
            snapshots_consistent = false;
        }
    }

    AuditReport {
        user_id: stored.user_id.clone(),
        transaction_count: transactions.len(),
        opening_balance: opening,
        replayed_total: running,
        stored_total: stored.total_balance,
        snapshots_consistent,
        balanced: running == stored.total_balance.as_decimal() && running >= Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionKind;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sx(value: Decimal) -> SxAmount {
        SxAmount::new(value).unwrap()
    }

    fn tx(kind: TransactionKind, amount: Decimal, after: Decimal) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            kind,
            game_type: None,
            amount,
            balance_after: sx(after),
            game_data: None,
            created_at: Utc::now(),
        }
    }

    fn stored(total: Decimal) -> Balance {
        let mut balance = Balance::opening("alice", sx(dec!(5)), Utc::now());
        balance.total_balance = sx(total);
        balance
    }

    #[test]
    fn test_fresh_account_balances() {
        let report = replay(sx(dec!(5)), &[], &stored(dec!(5)));
        assert!(report.balanced);
        assert!(report.snapshots_consistent);
        assert_eq!(report.transaction_count, 0);
    }

    #[test]
    fn test_bet_and_win_trail_balances() {
        let trail = [
            tx(TransactionKind::Bet, dec!(-2.00), dec!(3.00)),
            tx(TransactionKind::Win, dec!(4.00), dec!(7.00)),
            tx(TransactionKind::Bet, dec!(-7.00), dec!(0.00)),
            tx(TransactionKind::Loss, dec!(0.00), dec!(0.00)),
        ];
        let report = replay(sx(dec!(5)), &trail, &stored(dec!(0)));
        assert!(report.balanced);
        assert!(report.snapshots_consistent);
        assert_eq!(report.replayed_total, dec!(0.00));
    }

    #[test]
    fn test_drift_is_reported() {
        let trail = [tx(TransactionKind::Bonus, dec!(10.00), dec!(15.00))];
        let report = replay(sx(dec!(5)), &trail, &stored(dec!(14)));
        assert!(!report.balanced);
        assert!(report.snapshots_consistent);

        let trail = [tx(TransactionKind::Bonus, dec!(10.00), dec!(16.00))];
        let report = replay(sx(dec!(5)), &trail, &stored(dec!(15)));
        assert!(report.balanced);
        assert!(!report.snapshots_consistent);
    }
}
