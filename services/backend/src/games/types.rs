//! Choice and outcome tokens for each game
//!
//! Every token parses from the loose JSON the HTTP layer receives
//! (`"heads"`, `3`, `"3"`, `"RED"`) and serializes to one canonical form so
//! recorded game data can be replayed byte-for-byte.

use serde::{Deserialize, Serialize};
use shared::ROULETTE_RED_NUMBERS;
use std::fmt;

use crate::domain::{ChoiceInput, GameType};
use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl CoinSide {
    /// Map a draw from `next_uniform(2)`; 0 is heads
    pub fn from_draw(draw: u32) -> Self {
        if draw == 0 {
            CoinSide::Heads
        } else {
            CoinSide::Tails
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoinSide::Heads => "heads",
            CoinSide::Tails => "tails",
        }
    }
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A die face in `1..=6`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiceFace(u8);

impl DiceFace {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Map a draw from `next_uniform(6)` onto a face
    pub fn from_draw(draw: u32) -> Option<Self> {
        u8::try_from(draw)
            .ok()
            .and_then(|d| d.checked_add(1))
            .and_then(Self::new)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DiceFace {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("Dice face must be between 1 and 6, got {}", value))
    }
}

impl From<DiceFace> for u8 {
    fn from(face: DiceFace) -> Self {
        face.0
    }
}

impl fmt::Display for DiceFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouletteColor {
    Red,
    Black,
    Green,
}

impl RouletteColor {
    /// Colour of a pocket drawn from `next_uniform(38)`
    ///
    /// 0 and 37 (the "00" pocket) are green; the standard layout decides
    /// red or black for 1..=36.
    pub fn of_pocket(number: u32) -> Self {
        match number {
            0 | 37 => RouletteColor::Green,
            n if ROULETTE_RED_NUMBERS.contains(&n) => RouletteColor::Red,
            _ => RouletteColor::Black,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouletteColor::Red => "red",
            RouletteColor::Black => "black",
            RouletteColor::Green => "green",
        }
    }
}

impl fmt::Display for RouletteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated player choice, tied to the game it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameChoice {
    CoinFlip(CoinSide),
    DiceRoll(DiceFace),
    /// Only red or black; green can never be picked
    Roulette(RouletteColor),
}

impl GameChoice {
    pub fn parse(game_type: GameType, input: &ChoiceInput) -> Result<Self> {
        match game_type {
            GameType::CoinFlip => parse_coin_side(input).map(GameChoice::CoinFlip),
            GameType::DiceRoll => parse_dice_face(input).map(GameChoice::DiceRoll),
            GameType::Roulette => parse_roulette_color(input).map(GameChoice::Roulette),
        }
    }

    pub fn game_type(&self) -> GameType {
        match self {
            GameChoice::CoinFlip(_) => GameType::CoinFlip,
            GameChoice::DiceRoll(_) => GameType::DiceRoll,
            GameChoice::Roulette(_) => GameType::Roulette,
        }
    }
}

impl fmt::Display for GameChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameChoice::CoinFlip(side) => fmt::Display::fmt(side, f),
            GameChoice::DiceRoll(face) => fmt::Display::fmt(face, f),
            GameChoice::Roulette(color) => fmt::Display::fmt(color, f),
        }
    }
}

fn parse_coin_side(input: &ChoiceInput) -> Result<CoinSide> {
    match input {
        ChoiceInput::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "heads" => Ok(CoinSide::Heads),
            "tails" => Ok(CoinSide::Tails),
            _ => Err(invalid_choice(GameType::CoinFlip, input, "heads or tails")),
        },
        ChoiceInput::Number(_) => Err(invalid_choice(GameType::CoinFlip, input, "heads or tails")),
    }
}

fn parse_dice_face(input: &ChoiceInput) -> Result<DiceFace> {
    let value = match input {
        ChoiceInput::Number(n) => Some(*n),
        ChoiceInput::Text(text) => text.trim().parse::<i64>().ok(),
    };

    value
        .and_then(|v| u8::try_from(v).ok())
        .and_then(DiceFace::new)
        .ok_or_else(|| invalid_choice(GameType::DiceRoll, input, "a number from 1 to 6"))
}

fn parse_roulette_color(input: &ChoiceInput) -> Result<RouletteColor> {
    match input {
        ChoiceInput::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(RouletteColor::Red),
            "black" => Ok(RouletteColor::Black),
            _ => Err(invalid_choice(GameType::Roulette, input, "red or black")),
        },
        ChoiceInput::Number(_) => Err(invalid_choice(GameType::Roulette, input, "red or black")),
    }
}

fn invalid_choice(game_type: GameType, input: &ChoiceInput, expected: &str) -> AppError {
    AppError::InvalidBet(format!(
        "Invalid choice '{}' for {}: expected {}",
        input, game_type, expected
    ))
}
