use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::score::Side;

/// Serve/return profile of one player on one surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerRates {
    /// Share of service points won.
    pub serve_win_prob: f64,
    /// Share of return points won.
    pub return_win_prob: f64,
}

impl PlayerRates {
    /// Tour-average fallback used when a player has no statistics row.
    pub const TOUR_AVERAGE: PlayerRates = PlayerRates {
        serve_win_prob: 0.62,
        return_win_prob: 0.38,
    };

    pub fn new(serve_win_prob: f64, return_win_prob: f64) -> Result<Self, EngineError> {
        let rates = PlayerRates {
            serve_win_prob,
            return_win_prob,
        };
        rates.validate()?;
        Ok(rates)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, v) in [
            ("serve_win_prob", self.serve_win_prob),
            ("return_win_prob", self.return_win_prob),
        ] {
            if !(v > 0.0 && v < 1.0) {
                return Err(EngineError::InvalidRateProfile(format!(
                    "{} must be strictly between 0 and 1, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn validate_for(&self, side: Side) -> Result<(), EngineError> {
        self.validate().map_err(|e| match e {
            EngineError::InvalidRateProfile(msg) => {
                EngineError::InvalidRateProfile(format!("player {}: {}", side, msg))
            }
            other => other,
        })
    }
}

impl Default for PlayerRates {
    fn default() -> Self {
        PlayerRates::TOUR_AVERAGE
    }
}

/// Chance that `server` wins a point on serve against `returner`.
///
/// Normalised contest between the server's serve strength `s` and the
/// returner's return strength `r`: `s / (s + r)`. Two tour-average players
/// (0.62 / 0.38) therefore hold serve points at exactly 0.62.
pub fn serve_point_probability(server: &PlayerRates, returner: &PlayerRates) -> f64 {
    let s = server.serve_win_prob;
    let r = returner.return_win_prob;
    s / (s + r)
}
