//! Situational ("pressure") adjustment of the server's point-win probability.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::score::{ScoreState, Side, FORTY, GAMES_PER_SET, TIEBREAK_POINTS};

/// Multiplier used when none is configured.
pub const DEFAULT_PRESSURE_MULTIPLIER: f64 = 1.05;
/// Largest multiplier accepted.
pub const MAX_PRESSURE_MULTIPLIER: f64 = 1.25;

/// Why a point counts as high leverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureContext {
    Neutral,
    /// Both sides on three points: 40-40 in a regular game, 3-3 in a tiebreak.
    Deuce,
    /// Game gap of one with the leader on five or more games.
    SetPointContext,
    /// One side would take the tiebreak, and the set, with this point.
    TiebreakSetPoint,
}

impl PressureContext {
    pub fn is_pressure(self) -> bool {
        self != PressureContext::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureClassifier {
    multiplier: f64,
}

impl Default for PressureClassifier {
    fn default() -> Self {
        PressureClassifier {
            multiplier: DEFAULT_PRESSURE_MULTIPLIER,
        }
    }
}

impl PressureClassifier {
    pub fn new(multiplier: f64) -> Result<Self, EngineError> {
        if !(1.0..=MAX_PRESSURE_MULTIPLIER).contains(&multiplier) {
            return Err(EngineError::InvalidRateProfile(format!(
                "pressure multiplier must be between 1.0 and {}, got {}",
                MAX_PRESSURE_MULTIPLIER, multiplier
            )));
        }
        Ok(PressureClassifier { multiplier })
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Multiplier for the server's chance of winning the next point.
    pub fn classify(&self, state: &ScoreState) -> f64 {
        if self.context(state).is_pressure() {
            self.multiplier
        } else {
            1.0
        }
    }

    pub fn context(&self, state: &ScoreState) -> PressureContext {
        if state.is_complete() {
            return PressureContext::Neutral;
        }

        if state.points == [FORTY, FORTY] {
            return PressureContext::Deuce;
        }

        if state.in_tiebreak() {
            let tiebreak_point = Side::BOTH.into_iter().any(|s| {
                let mine = state.points_of(s);
                mine + 1 >= TIEBREAK_POINTS && mine > state.points_of(s.other())
            });
            return if tiebreak_point {
                PressureContext::TiebreakSetPoint
            } else {
                PressureContext::Neutral
            };
        }

        let [ga, gb] = state.games;
        if ga.abs_diff(gb) == 1 && ga.max(gb) >= GAMES_PER_SET - 1 {
            return PressureContext::SetPointContext;
        }

        PressureContext::Neutral
    }
}
