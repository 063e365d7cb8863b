//! Random outcome generation
//!
//! Draws come from the operating system CSPRNG and are reduced to `[0, n)`
//! with rejection sampling, so every value is exactly equally likely.
//! There is no fallback generator: if the OS cannot supply entropy the play
//! fails with an infrastructure error before any ledger effect.

use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::errors::{AppError, Result};

pub trait OutcomeSource: Send + Sync {
    /// Uniform integer in `[0, n)`
    fn next_uniform(&self, n: u32) -> Result<u32>;
}

/// Production source backed by `OsRng`
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl OsEntropy {
    fn draw_u32() -> Result<u32> {
        let mut buf = [0u8; 4];
        let mut rng = OsRng;
        rng.try_fill_bytes(&mut buf).map_err(|e| {
            tracing::error!(error = %e, "OS entropy source failed");
            AppError::Entropy(e.to_string())
        })?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl OutcomeSource for OsEntropy {
    fn next_uniform(&self, n: u32) -> Result<u32> {
        let zone = acceptance_zone(n)?;
        loop {
            let draw = u64::from(Self::draw_u32()?);
            if draw < zone {
                return Ok((draw % u64::from(n)) as u32);
            }
        }
    }
}

/// Largest multiple of `n` that fits in the 32-bit draw space
///
/// Draws at or above this bound would over-represent the low residues.
fn acceptance_zone(n: u32) -> Result<u64> {
    if n == 0 {
        return Err(AppError::Entropy(
            "cannot draw from an empty range".to_string(),
        ));
    }
    let space = u64::from(u32::MAX) + 1;
    Ok(space - space % u64::from(n))
}

/// Replays a fixed queue of draws, for deterministic settlement tests
#[derive(Debug, Default)]
pub struct ScriptedOutcomes {
    draws: Mutex<VecDeque<u32>>,
}

impl ScriptedOutcomes {
    pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
        Self {
            draws: Mutex::new(draws.into_iter().collect()),
        }
    }

    /// Queue more draws behind the ones already scripted
    pub fn push(&self, draws: impl IntoIterator<Item = u32>) {
        if let Ok(mut queue) = self.draws.lock() {
            queue.extend(draws);
        }
    }

    pub fn remaining(&self) -> usize {
        self.draws.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl OutcomeSource for ScriptedOutcomes {
    fn next_uniform(&self, n: u32) -> Result<u32> {
        acceptance_zone(n)?;
        let draw = self
            .draws
            .lock()
            .map_err(|_| AppError::Entropy("scripted outcome queue poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| AppError::Entropy("scripted outcomes exhausted".to_string()))?;

        if draw >= n {
            return Err(AppError::Entropy(format!(
                "scripted draw {} is outside [0, {})",
                draw, n
            )));
        }
        Ok(draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_entropy_stays_in_range() {
        let source = OsEntropy;
        for n in [1, 2, 6, 38, 1_000, u32::MAX] {
            for _ in 0..200 {
                assert!(source.next_uniform(n).unwrap() < n);
            }
        }
    }

    #[test]
    fn test_os_entropy_covers_small_ranges() {
        let source = OsEntropy;
        let mut seen = [false; 6];
        for _ in 0..2_000 {
            seen[source.next_uniform(6).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_zero_range_is_an_entropy_error() {
        assert!(matches!(OsEntropy.next_uniform(0), Err(AppError::Entropy(_))));
        assert!(matches!(
            ScriptedOutcomes::new([0]).next_uniform(0),
            Err(AppError::Entropy(_))
        ));
    }

    #[test]
    fn test_acceptance_zone_is_a_multiple() {
        assert_eq!(acceptance_zone(1).unwrap(), 1 << 32);
        assert_eq!(acceptance_zone(2).unwrap(), 1 << 32);
        let zone = acceptance_zone(38).unwrap();
        assert_eq!(zone % 38, 0);
        assert!((1u64 << 32) - zone < 38);
    }

    #[test]
    fn test_scripted_outcomes_replay_in_order() {
        let source = ScriptedOutcomes::new([1, 0, 5]);
        assert_eq!(source.next_uniform(2).unwrap(), 1);
        assert_eq!(source.next_uniform(2).unwrap(), 0);
        assert_eq!(source.next_uniform(6).unwrap(), 5);
        assert!(matches!(source.next_uniform(2), Err(AppError::Entropy(_))));
    }

    #[test]
    fn test_scripted_draw_out_of_range_is_rejected() {
        let source = ScriptedOutcomes::new([7]);
        assert!(source.next_uniform(6).is_err());
        assert_eq!(source.remaining(), 0);
    }
}
