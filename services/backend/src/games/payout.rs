//! Pure payout rules
//!
//! Each rule maps `(bet, choice, draw)` to the resolved result and the
//! winnings. Nothing here touches entropy or storage.

use shared::{
    SxAmount, COIN_FLIP_MULTIPLIER, DICE_ROLL_MULTIPLIER, MAX_SX_AMOUNT, ROULETTE_MULTIPLIER,
};

use super::types::{CoinSide, DiceFace, GameChoice, RouletteColor};
use crate::domain::{GameType, TransactionData};
use crate::errors::{AppError, Result};

/// Outcome of applying a payout rule to one draw
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub won: bool,
    pub multiplier: u32,
    pub winnings: SxAmount,
    /// Canonical result token (`"tails"`, `"4"`, `"black"`)
    pub result: String,
    pub game_data: TransactionData,
}

pub fn coin_flip(bet: SxAmount, choice: CoinSide, result: CoinSide) -> Result<Resolution> {
    let won = choice == result;
    Ok(Resolution {
        won,
        multiplier: COIN_FLIP_MULTIPLIER,
        winnings: winnings(bet, won, COIN_FLIP_MULTIPLIER)?,
        result: result.to_string(),
        game_data: TransactionData::CoinFlip {
            choice,
            result,
            multiplier: COIN_FLIP_MULTIPLIER,
        },
    })
}

pub fn dice_roll(bet: SxAmount, choice: DiceFace, result: DiceFace) -> Result<Resolution> {
    let won = choice == result;
    Ok(Resolution {
        won,
        multiplier: DICE_ROLL_MULTIPLIER,
        winnings: winnings(bet, won, DICE_ROLL_MULTIPLIER)?,
        result: result.to_string(),
        game_data: TransactionData::DiceRoll {
            choice,
            result,
            multiplier: DICE_ROLL_MULTIPLIER,
        },
    })
}

/// Green pockets lose for every choice
pub fn roulette(bet: SxAmount, choice: RouletteColor, pocket: u32) -> Result<Resolution> {
    let color = RouletteColor::of_pocket(pocket);
    let won = color != RouletteColor::Green && color == choice;
    Ok(Resolution {
        won,
        multiplier: ROULETTE_MULTIPLIER,
        winnings: winnings(bet, won, ROULETTE_MULTIPLIER)?,
        result: color.to_string(),
        game_data: TransactionData::Roulette {
            choice,
            result: color,
            number: pocket,
            multiplier: ROULETTE_MULTIPLIER,
        },
    })
}

/// Multiplier paid on a win for the given game
pub fn multiplier_for(game_type: GameType) -> u32 {
    match game_type {
        GameType::CoinFlip => COIN_FLIP_MULTIPLIER,
        GameType::DiceRoll => DICE_ROLL_MULTIPLIER,
        GameType::Roulette => ROULETTE_MULTIPLIER,
    }
}

/// Reject stakes whose winning payout could not be credited
pub fn ensure_payable(bet: SxAmount, game_type: GameType) -> Result<()> {
    winnings(bet, true, multiplier_for(game_type)).map(|_| ())
}

/// Reject stakes whose win would lift `total` past the largest storable balance
///
/// A bet larger than `total` is left to the ledger's funds check.
pub fn ensure_within_ceiling(total: SxAmount, bet: SxAmount, game_type: GameType) -> Result<()> {
    if bet > total {
        return Ok(());
    }
    let payout = winnings(bet, true, multiplier_for(game_type))?;
    let after_bet = total
        .checked_sub(bet)
        .map_err(|e| AppError::InvalidBet(e.to_string()))?;
    after_bet.checked_add(payout).map(|_| ()).map_err(|_| {
        AppError::InvalidBet(format!(
            "A win of {} would exceed the balance ceiling {}",
            payout, MAX_SX_AMOUNT
        ))
    })
}

/// Resolve a validated choice against a raw draw for its game
///
/// `draw` is the value returned by `next_uniform` for the game's range.
pub fn resolve(bet: SxAmount, choice: GameChoice, draw: u32) -> Result<Resolution> {
    match choice {
        GameChoice::CoinFlip(side) => coin_flip(bet, side, CoinSide::from_draw(draw)),
        GameChoice::DiceRoll(face) => {
            let rolled = DiceFace::from_draw(draw).ok_or_else(|| {
                AppError::Entropy(format!("dice draw {} outside [0, 6)", draw))
            })?;
            dice_roll(bet, face, rolled)
        }
        GameChoice::Roulette(color) => roulette(bet, color, draw),
    }
}

fn winnings(bet: SxAmount, won: bool, multiplier: u32) -> Result<SxAmount> {
    if !won {
        return Ok(SxAmount::ZERO);
    }
    bet.checked_mul(multiplier)
        .map_err(|e| AppError::InvalidBet(format!("Payout for {} is not representable: {}", bet, e)))
}
