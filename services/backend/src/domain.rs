use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::SxAmount;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::games::types::{CoinSide, DiceFace, RouletteColor};

/// Per-user balance row, owned exclusively by the ledger engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub user_id: String,
    pub total_balance: SxAmount,
    /// Winnings and admin grants; the withdrawable portion of `total_balance`
    pub earned_balance: SxAmount,
    /// Informational: signup credit that can be gambled but not withdrawn
    pub bonus_balance: SxAmount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Opening balance for a brand new account
    pub fn opening(user_id: &str, signup_bonus: SxAmount, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_balance: signup_bonus,
            earned_balance: SxAmount::ZERO,
            bonus_balance: signup_bonus,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    CoinFlip,
    DiceRoll,
    Roulette,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::CoinFlip => "coin_flip",
            GameType::DiceRoll => "dice_roll",
            GameType::Roulette => "roulette",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = String;

    /// Accepts both the stored form (`coin_flip`) and the path form (`coin-flip`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "coin_flip" => Ok(GameType::CoinFlip),
            "dice_roll" => Ok(GameType::DiceRoll),
            "roulette" => Ok(GameType::Roulette),
            other => Err(format!("Unknown game type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Bet,
    Win,
    Loss,
    Withdrawal,
    Bonus,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Bet => "bet",
            TransactionKind::Win => "win",
            TransactionKind::Loss => "loss",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Bonus => "bonus",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bet" => Ok(TransactionKind::Bet),
            "win" => Ok(TransactionKind::Win),
            "loss" => Ok(TransactionKind::Loss),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "bonus" => Ok(TransactionKind::Bonus),
            other => Err(format!("Unknown transaction type: {}", other)),
        }
    }
}

/// Audit payload attached to every ledger entry
///
/// One variant per game so a settlement always records the fields needed to
/// reconstruct the payout from the draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionData {
    CoinFlip {
        choice: CoinSide,
        result: CoinSide,
        multiplier: u32,
    },
    DiceRoll {
        choice: DiceFace,
        result: DiceFace,
        multiplier: u32,
    },
    Roulette {
        choice: RouletteColor,
        result: RouletteColor,
        number: u32,
        multiplier: u32,
    },
    Bonus {
        source: String,
    },
    Withdrawal {
        /// None for direct admin debits that bypass the request flow
        request_id: Option<Uuid>,
        status: WithdrawalStatus,
    },
}

impl TransactionData {
    pub fn game_type(&self) -> Option<GameType> {
        match self {
            TransactionData::CoinFlip { .. } => Some(GameType::CoinFlip),
            TransactionData::DiceRoll { .. } => Some(GameType::DiceRoll),
            TransactionData::Roulette { .. } => Some(GameType::Roulette),
            TransactionData::Bonus { .. } | TransactionData::Withdrawal { .. } => None,
        }
    }
}

/// Append-only ledger entry; never mutated once written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub game_type: Option<GameType>,
    /// Signed: negative for debits, positive for credits, zero for audit entries
    pub amount: Decimal,
    pub balance_after: SxAmount,
    pub game_data: Option<TransactionData>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(format!("Unknown withdrawal status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: String,
    pub amount: SxAmount,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    pub fn pending(user_id: &str, amount: SxAmount, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount,
            status: WithdrawalStatus::Pending,
            created_at: now,
            processed_at: None,
        }
    }
}

/// Ephemeral result of one play, returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameOutcome {
    pub game_type: GameType,
    pub choice: String,
    pub result: String,
    pub won: bool,
    pub multiplier: u32,
    pub winnings: SxAmount,
    pub new_balance: SxAmount,
    pub game_data: TransactionData,
}

/// Replay of a user's ledger against the stored balance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditReport {
    pub user_id: String,
    pub transaction_count: usize,
    pub opening_balance: SxAmount,
    pub replayed_total: Decimal,
    pub stored_total: SxAmount,
    /// Every `balance_after` equals the running sum at that point
    pub snapshots_consistent: bool,
    pub balanced: bool,
}

// HTTP request/response bodies

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceInput {
    Number(i64),
    Text(String),
}

impl fmt::Display for ChoiceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceInput::Number(n) => write!(f, "{}", n),
            ChoiceInput::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayGameRequest {
    pub amount: Decimal,
    pub choice: ChoiceInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequestBody {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantBonusRequest {
    pub user_id: String,
    pub amount: Decimal,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantBonusResponse {
    pub user_id: String,
    pub new_balance: SxAmount,
}
