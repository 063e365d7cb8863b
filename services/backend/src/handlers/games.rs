use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    domain::{GameOutcome, GameType, PlayGameRequest},
    errors::{AppError, Result},
    extractors::{AuthenticatedUser, ValidatedJson},
    state::AppState,
};

/// `POST /api/games/:game_type`; accepts `coin_flip` as well as `coin-flip`
pub async fn play_game(
    State(state): State<AppState>,
    Path(game_type): Path<String>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    ValidatedJson(req): ValidatedJson<PlayGameRequest>,
) -> Result<Json<GameOutcome>> {
    let game_type: GameType = game_type.parse().map_err(AppError::InvalidBet)?;

    let outcome = state
        .games
        .play(&user_id, game_type, req.amount, &req.choice)
        .await?;
    Ok(Json(outcome))
}
