/// Shared constants for the SX casino ledger
///
/// This module centralizes all magic numbers so the ledger, the game
/// settlement service and the withdrawal engine agree on them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Signup credit granted to every new account (5 SX)
///
/// Counted in `total_balance` and `bonus_balance`, never in `earned_balance`,
/// so it can be gambled but not withdrawn directly.
pub const SIGNUP_BONUS: Decimal = dec!(5.00);

/// Minimum total balance required before a withdrawal may be requested
pub const WITHDRAWAL_MIN_TOTAL: Decimal = dec!(10.00);

/// Minimum earned balance required before a withdrawal may be requested
pub const WITHDRAWAL_MIN_EARNED: Decimal = dec!(10.00);

/// Number of fractional digits carried by every SX amount
pub const SX_DECIMAL_PLACES: u32 = 2;

/// Largest representable SX amount
///
/// Matches a NUMERIC(12, 2) column: 10 integer digits, 2 fractional.
pub const MAX_SX_AMOUNT: Decimal = dec!(9999999999.99);

/// Coin flip pays 2x the stake on a win
pub const COIN_FLIP_MULTIPLIER: u32 = 2;

/// Dice roll pays 6x the stake on an exact face match
pub const DICE_ROLL_MULTIPLIER: u32 = 6;

/// Roulette colour bets pay 2x the stake
pub const ROULETTE_MULTIPLIER: u32 = 2;

/// Number of pockets on the wheel (0, 1-36 and the "00" pocket drawn as 37)
pub const ROULETTE_POCKETS: u32 = 38;

/// Red pockets of the standard layout; 0 and 37 are green, the rest black
pub const ROULETTE_RED_NUMBERS: [u32; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Default page size for transaction history
pub const DEFAULT_TRANSACTION_PAGE: usize = 20;

/// Hard cap on transaction history page size
pub const MAX_TRANSACTION_PAGE: usize = 100;

/// Default bounded wait for the per-user critical section
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Default number of read-check-commit attempts under optimistic stores
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;
