use rust_decimal::Decimal;
use shared::SxAmount;
use std::sync::Arc;

use super::payout;
use super::rng::OutcomeSource;
use super::types::GameChoice;
use crate::domain::{ChoiceInput, GameOutcome, GameType};
use crate::errors::{AppError, Result};
use crate::ledger::LedgerEngine;

/// Size of the draw range for each game
fn draw_range(game_type: GameType) -> u32 {
    match game_type {
        GameType::CoinFlip => 2,
        GameType::DiceRoll => 6,
        GameType::Roulette => shared::ROULETTE_POCKETS,
    }
}

/// Plays one game end to end
///
/// Order is fixed: validate (shape, choice, balance ceiling), draw, apply the
/// payout rule, settle. Nothing is drawn for an invalid bet and nothing is settled before the draw exists,
/// so the recorded game data is always the draw that decided the payout.
pub struct GameService {
    ledger: Arc<LedgerEngine>,
    outcomes: Arc<dyn OutcomeSource>,
}

impl GameService {
    pub fn new(ledger: Arc<LedgerEngine>, outcomes: Arc<dyn OutcomeSource>) -> Self {
        Self { ledger, outcomes }
    }

    #[tracing::instrument(name = "play_game", skip(self, choice), fields(choice = %choice))]
    pub async fn play(
        &self,
        user_id: &str,
        game_type: GameType,
        amount: Decimal,
        choice: &ChoiceInput,
    ) -> Result<GameOutcome> {
        let bet = validate_bet(amount, game_type)?;
        let choice = GameChoice::parse(game_type, choice)?;
        let current = self.ledger.balance(user_id).await?;
        payout::ensure_within_ceiling(current.total_balance, bet, game_type)?;

        let draw = self.outcomes.next_uniform(draw_range(game_type))?;
        let resolution = payout::resolve(bet, choice, draw)?;

        let settlement = self
            .ledger
            .settle(user_id, bet, resolution.winnings, &resolution.game_data)
            .await?;

        let outcome_label = if resolution.won { "win" } else { "loss" };
        metrics::counter!(
            "games_played_total",
            "game_type" => game_type.as_str(),
            "outcome" => outcome_label
        )
        .increment(1);
        tracing::info!(
            result = %resolution.result,
            won = resolution.won,
            winnings = %resolution.winnings.as_decimal(),
            new_total = %settlement.balance.total_balance.as_decimal(),
            "Game settled"
        );

        Ok(GameOutcome {
            game_type,
            choice: choice.to_string(),
            result: resolution.result,
            won: resolution.won,
            multiplier: resolution.multiplier,
            winnings: resolution.winnings,
            new_balance: settlement.balance.total_balance,
            game_data: resolution.game_data,
        })
    }
}

fn validate_bet(amount: Decimal, game_type: GameType) -> Result<SxAmount> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidBet(
            "Bet amount must be greater than zero".to_string(),
        ));
    }
    let bet = SxAmount::new(amount).map_err(|e| AppError::InvalidBet(e.to_string()))?;
    payout::ensure_payable(bet, game_type)?;
    Ok(bet)
}
