use rust_decimal::Decimal;
use shared::{SxAmount, WITHDRAWAL_MIN_EARNED, WITHDRAWAL_MIN_TOTAL};

use crate::domain::Balance;
use crate::errors::{AppError, Result};

/// Thresholds a balance must meet before a withdrawal may be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    pub min_total: SxAmount,
    pub min_earned: SxAmount,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            min_total: SxAmount::new(WITHDRAWAL_MIN_TOTAL).unwrap_or_default(),
            min_earned: SxAmount::new(WITHDRAWAL_MIN_EARNED).unwrap_or_default(),
        }
    }
}

impl EligibilityPolicy {
    pub fn is_eligible(&self, balance: &Balance) -> bool {
        balance.total_balance >= self.min_total && balance.earned_balance >= self.min_earned
    }

    /// Largest amount one request may ask for
    pub fn max_withdrawable(&self, balance: &Balance) -> SxAmount {
        if self.is_eligible(balance) {
            balance.earned_balance
        } else {
            SxAmount::ZERO
        }
    }

    /// Check a requested amount against the current balance
    ///
    /// Order: amount shape, then eligibility, then the earned ceiling.
    pub fn check_request(&self, balance: &Balance, amount: Decimal) -> Result<SxAmount> {
        let amount = parse_amount(amount)?;
        if !self.is_eligible(balance) {
            return Err(AppError::NotEligible {
                total: balance.total_balance,
                earned: balance.earned_balance,
            });
        }
        if amount > balance.earned_balance {
            return Err(AppError::ExceedsEarned {
                requested: amount,
                earned: balance.earned_balance,
            });
        }
        Ok(amount)
    }
}

/// A withdrawal amount must be positive with at most two decimal places
pub fn parse_amount(amount: Decimal) -> Result<SxAmount> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(
            "Withdrawal amount must be greater than zero".to_string(),
        ));
    }
    SxAmount::new(amount).map_err(|e| AppError::InvalidAmount(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn balance(total: Decimal, earned: Decimal) -> Balance {
        let mut balance = Balance::opening("alice", SxAmount::new(dec!(5)).unwrap(), Utc::now());
        balance.total_balance = SxAmount::new(total).unwrap();
        balance.earned_balance = SxAmount::new(earned).unwrap();
        balance
    }

    #[test]
    fn test_eligibility_boundary() {
        let policy = EligibilityPolicy::default();
        assert!(!policy.is_eligible(&balance(dec!(10.00), dec!(9.99))));
        assert!(!policy.is_eligible(&balance(dec!(9.99), dec!(9.99))));
        assert!(policy.is_eligible(&balance(dec!(10.00), dec!(10.00))));
    }

    #[test]
    fn test_request_checks_in_order() {
        let policy = EligibilityPolicy::default();

        // Bad amount wins over ineligibility
        assert!(matches!(
            policy.check_request(&balance(dec!(5), dec!(0)), dec!(0)),
            Err(AppError::InvalidAmount(_))
        ));
        assert!(matches!(
            policy.check_request(&balance(dec!(5), dec!(0)), dec!(1)),
            Err(AppError::NotEligible { .. })
        ));
        assert!(matches!(
            policy.check_request(&balance(dec!(30), dec!(12)), dec!(12.01)),
            Err(AppError::ExceedsEarned { .. })
        ));
        assert_eq!(
            policy.check_request(&balance(dec!(30), dec!(12)), dec!(12)).unwrap(),
            SxAmount::new(dec!(12)).unwrap()
        );
    }

    #[test]
    fn test_amount_precision_is_rejected() {
        assert!(matches!(parse_amount(dec!(1.005)), Err(AppError::InvalidAmount(_))));
        assert!(matches!(parse_amount(dec!(-3)), Err(AppError::InvalidAmount(_))));
    }

    #[test]
    fn test_max_withdrawable() {
        let policy = EligibilityPolicy::default();
        assert!(policy.max_withdrawable(&balance(dec!(10), dec!(9.99))).is_zero());
        assert_eq!(
            policy.max_withdrawable(&balance(dec!(40), dec!(15))),
            SxAmount::new(dec!(15)).unwrap()
        );
    }
}
