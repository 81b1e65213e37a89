use thiserror::Error;

use super::score::Side;

/// Failures surfaced by the simulation and staking engine.
///
/// None of these are fatal: the caller decides whether to substitute a
/// default (e.g. league-average rates on `StatsNotFound`) or report the
/// problem to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid score state: {0}")]
    InvalidScoreState(String),

    #[error("invalid market input: {0}")]
    InvalidMarketInput(String),

    #[error("invalid rate profile: {0}")]
    InvalidRateProfile(String),

    #[error("no statistics for {player} ({surface}, {tour})")]
    StatsNotFound {
        player: String,
        surface: String,
        tour: String,
    },

    #[error("simulation needs at least one trial")]
    SimulationUnderflow,

    #[error("{requested} trials requested, the limit is {max}")]
    TrialLimitExceeded { requested: u64, max: u64 },
}

impl EngineError {
    pub(crate) fn score(msg: impl Into<String>) -> Self {
        EngineError::InvalidScoreState(msg.into())
    }

    pub(crate) fn market(side: Side, msg: impl std::fmt::Display) -> Self {
        EngineError::InvalidMarketInput(format!("player {}: {}", side, msg))
    }

    /// Errors caused by bad caller input rather than missing data.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, EngineError::StatsNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_problem() {
        let err = EngineError::score("games 7-7");
        assert_eq!(err.to_string(), "invalid score state: games 7-7");

        let err = EngineError::StatsNotFound {
            player: "Nobody".into(),
            surface: "clay".into(),
            tour: "atp".into(),
        };
        assert!(err.to_string().contains("Nobody"));
        assert!(!err.is_input_error());
        assert!(EngineError::SimulationUnderflow.is_input_error());
    }

    #[test]
    fn market_errors_name_the_side() {
        let err = EngineError::market(Side::B, "odds must exceed 1.0");
        assert_eq!(
            err.to_string(),
            "invalid market input: player B: odds must exceed 1.0"
        );
    }
}
