/// Type-safe wrappers for domain primitives
///
/// These types prevent common errors by enforcing validation at construction time
/// and providing checked arithmetic operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

use crate::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must not be negative: {0}")]
    NegativeAmount(Decimal),

    #[error("Amount has more than {max} decimal places: {amount}")]
    TooPrecise { amount: Decimal, max: u32 },

    #[error("Amount out of range: {amount} (max: {max})")]
    AmountOutOfRange { amount: Decimal, max: Decimal },

    #[error("Amount overflow in operation")]
    AmountOverflow,

    #[error("Amount underflow in operation")]
    AmountUnderflow,

    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),
}

/// Non-negative SX amount with exactly two fractional digits
///
/// All balances, stakes and winnings flow through this type so repeated
/// settlements never accumulate floating point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SxAmount(Decimal);

impl SxAmount {
    /// Zero at the currency scale, so it serializes as "0.00"
    pub const ZERO: SxAmount = SxAmount(Decimal::from_parts(0, 0, 0, false, SX_DECIMAL_PLACES));

    /// Create a new SxAmount with validation
    pub fn new(amount: Decimal) -> Result<Self, ValidationError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValidationError::NegativeAmount(amount));
        }
        if amount.normalize().scale() > SX_DECIMAL_PLACES {
            return Err(ValidationError::TooPrecise {
                amount,
                max: SX_DECIMAL_PLACES,
            });
        }
        if amount > MAX_SX_AMOUNT {
            return Err(ValidationError::AmountOutOfRange {
                amount,
                max: MAX_SX_AMOUNT,
            });
        }
        let mut value = amount.abs();
        value.rescale(SX_DECIMAL_PLACES);
        Ok(Self(value))
    }

    /// Create from a whole number of cents
    pub fn from_cents(cents: u64) -> Result<Self, ValidationError> {
        let cents = i64::try_from(cents).map_err(|_| ValidationError::AmountOverflow)?;
        Self::new(Decimal::new(cents, SX_DECIMAL_PLACES))
    }

    /// Get the underlying decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Signed debit representation (`-amount`) used for ledger entries
    pub fn as_debit(&self) -> Decimal {
        -self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero()
    }

    /// Checked addition
    pub fn checked_add(&self, other: SxAmount) -> Result<Self, ValidationError> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or(ValidationError::AmountOverflow)?;
        if sum > MAX_SX_AMOUNT {
            return Err(ValidationError::AmountOverflow);
        }
        Ok(Self(sum))
    }

    /// Checked subtraction, failing instead of going below zero
    pub fn checked_sub(&self, other: SxAmount) -> Result<Self, ValidationError> {
        if other.0 > self.0 {
            return Err(ValidationError::AmountUnderflow);
        }
        let mut diff = self.0 - other.0;
        diff.rescale(SX_DECIMAL_PLACES);
        Ok(Self(diff))
    }

    /// Checked multiplication by a whole-number payout multiplier
    pub fn checked_mul(&self, multiplier: u32) -> Result<Self, ValidationError> {
        let product = self
            .0
            .checked_mul(Decimal::from(multiplier))
            .ok_or(ValidationError::AmountOverflow)?;
        if product > MAX_SX_AMOUNT {
            return Err(ValidationError::AmountOverflow);
        }
        let mut product = product;
        product.rescale(SX_DECIMAL_PLACES);
        Ok(Self(product))
    }
}

impl Default for SxAmount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for SxAmount {
    type Error = ValidationError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<SxAmount> for Decimal {
    fn from(amount: SxAmount) -> Self {
        amount.0
    }
}

impl FromStr for SxAmount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| ValidationError::InvalidFormat(s.to_string()))?;
        Self::new(value)
    }
}

impl std::fmt::Display for SxAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} SX", self.0)
    }
}

impl Serialize for SxAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for SxAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        SxAmount::new(value)
            .map_err(|e| serde::de::Error::custom(format!("Invalid SX amount: {}", e)))
    }
}

/// Normalize a signed ledger amount to the two-place currency scale
pub fn to_currency_scale(value: Decimal) -> Decimal {
    let mut value = value.round_dp(SX_DECIMAL_PLACES);
    value.rescale(SX_DECIMAL_PLACES);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sx_amount_validation() {
        let amount = SxAmount::new(dec!(12.5)).unwrap();
        assert_eq!(amount.as_decimal(), dec!(12.50));
        assert_eq!(amount.as_decimal().to_string(), "12.50");

        assert!(matches!(
            SxAmount::new(dec!(-1)),
            Err(ValidationError::NegativeAmount(_))
        ));
        assert!(matches!(
            SxAmount::new(dec!(0.001)),
            Err(ValidationError::TooPrecise { .. })
        ));
        assert!(matches!(
            SxAmount::new(MAX_SX_AMOUNT + dec!(0.01)),
            Err(ValidationError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        let amount = SxAmount::new(dec!(5.000)).unwrap();
        assert_eq!(amount.as_decimal().to_string(), "5.00");
    }

    #[test]
    fn test_sx_amount_arithmetic() {
        let a = SxAmount::from_cents(1_000).unwrap();
        let b = SxAmount::from_cents(250).unwrap();

        assert_eq!(a.checked_add(b).unwrap().as_decimal(), dec!(12.50));
        assert_eq!(a.checked_sub(b).unwrap().as_decimal(), dec!(7.50));
        assert_eq!(b.checked_mul(6).unwrap().as_decimal(), dec!(15.00));
        assert_eq!(a.as_debit(), dec!(-10.00));
    }

    #[test]
    fn test_sx_amount_underflow_and_overflow() {
        let small = SxAmount::from_cents(1).unwrap();
        let large = SxAmount::new(MAX_SX_AMOUNT).unwrap();

        assert_eq!(
            small.checked_sub(large),
            Err(ValidationError::AmountUnderflow)
        );
        assert_eq!(large.checked_add(small), Err(ValidationError::AmountOverflow));
        assert_eq!(large.checked_mul(2), Err(ValidationError::AmountOverflow));
    }

    #[test]
    fn test_sx_amount_serde() {
        let amount: SxAmount = serde_json::from_str("\"10.25\"").unwrap();
        assert_eq!(amount.as_decimal(), dec!(10.25));

        let amount: SxAmount = serde_json::from_str("3").unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"3.00\"");

        assert!(serde_json::from_str::<SxAmount>("\"-2\"").is_err());
        assert!(serde_json::from_str::<SxAmount>("{\"amount\": 1}").is_err());
        assert!(serde_json::from_str::<SxAmount>("\"1.234\"").is_err());
    }

    #[test]
    fn test_zero_keeps_currency_scale() {
        assert_eq!(serde_json::to_string(&SxAmount::ZERO).unwrap(), "\"0.00\"");
        assert_eq!(SxAmount::ZERO, SxAmount::new(dec!(0)).unwrap());
        assert_eq!(SxAmount::default().as_decimal().to_string(), "0.00");
        assert!(SxAmount::ZERO.is_zero());
    }

    #[test]
    fn test_parse_from_str() {
        assert_eq!("7.1".parse::<SxAmount>().unwrap().as_decimal(), dec!(7.10));
        assert!(matches!(
            "seven".parse::<SxAmount>(),
            Err(ValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_to_currency_scale() {
        assert_eq!(to_currency_scale(dec!(-5)).to_string(), "-5.00");
        assert_eq!(to_currency_scale(dec!(0)).to_string(), "0.00");
    }
}
