pub mod payout;
pub mod rng;
pub mod service;
pub mod types;

pub use rng::{OsEntropy, OutcomeSource, ScriptedOutcomes};
pub use service::GameService;
pub use types::{CoinSide, DiceFace, GameChoice, RouletteColor};
