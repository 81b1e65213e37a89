//! Match score representation.
//!
//! A [`ScoreState`] is a small `Copy` value: the simulator copies it at the
//! start of every trial and the resolver returns a fresh value for every
//! point, so no score is ever shared or mutated across trials.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::EngineError;

/// Games apiece at which the current set is decided by a tiebreak.
pub const TIEBREAK_AT: u8 = 6;
/// Games needed to take a set outright (with a two-game margin).
pub const GAMES_PER_SET: u8 = 6;
/// Points needed to take a tiebreak (with a two-point margin).
pub const TIEBREAK_POINTS: u8 = 7;
/// Semantic "40" in a regular game.
pub const FORTY: u8 = 3;
/// Semantic "advantage" in a regular game.
pub const ADVANTAGE: u8 = 4;

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "A")]
    A,
    #[serde(alias = "B")]
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// Best-of-N match format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MatchFormat {
    BestOf3,
    BestOf5,
}

impl MatchFormat {
    pub fn best_of(self) -> u8 {
        match self {
            MatchFormat::BestOf3 => 3,
            MatchFormat::BestOf5 => 5,
        }
    }

    /// `ceil(best_of / 2)`
    pub fn sets_to_win(self) -> u8 {
        self.best_of().div_ceil(2)
    }
}

impl TryFrom<u8> for MatchFormat {
    type Error = EngineError;

    fn try_from(best_of: u8) -> Result<Self, Self::Error> {
        match best_of {
            3 => Ok(MatchFormat::BestOf3),
            5 => Ok(MatchFormat::BestOf5),
            other => Err(EngineError::score(format!(
                "match format must be best of 3 or 5, got {}",
                other
            ))),
        }
    }
}

impl From<MatchFormat> for u8 {
    fn from(format: MatchFormat) -> u8 {
        format.best_of()
    }
}

/// Progress of a match.
///
/// In a regular game `points` are semantic: 0..=3 for 0/15/30/40 and
/// [`ADVANTAGE`] for the side holding advantage (the other side is then at
/// 40). In a tiebreak (games 6-6) they are raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreState {
    pub sets: [u8; 2],
    pub games: [u8; 2],
    pub points: [u8; 2],
    pub server: Side,
    pub format: MatchFormat,
}

impl ScoreState {
    /// A match that has not started yet.
    pub fn start(format: MatchFormat, server: Side) -> Self {
        ScoreState {
            sets: [0, 0],
            games: [0, 0],
            points: [0, 0],
            server,
            format,
        }
    }

    /// Build a state from user input, rejecting impossible scores.
    pub fn new(
        sets: [u8; 2],
        games: [u8; 2],
        points: [u8; 2],
        server: Side,
        format: MatchFormat,
    ) -> Result<Self, EngineError> {
        let state = ScoreState {
            sets,
            games,
            points,
            ..ScoreState::start(format, server)
        };
        state.validate()?;
        Ok(state)
    }

    pub fn sets_of(&self, side: Side) -> u8 {
        self.sets[side.index()]
    }

    pub fn points_of(&self, side: Side) -> u8 {
        self.points[side.index()]
    }

    pub fn receiver(&self) -> Side {
        self.server.other()
    }

    /// The side that has won the match, if any.
    pub fn winner(&self) -> Option<Side> {
        let needed = self.format.sets_to_win();
        Side::BOTH.into_iter().find(|s| self.sets_of(*s) >= needed)
    }

    pub fn is_complete(&self) -> bool {
        self.winner().is_some()
    }

    pub fn in_tiebreak(&self) -> bool {
        self.games == [TIEBREAK_AT, TIEBREAK_AT]
    }

    /// Check the state against the rules of tennis.
    pub fn validate(&self) -> Result<(), EngineError> {
        let needed = self.format.sets_to_win();
        let [sa, sb] = self.sets;
        if sa > needed || sb > needed {
            return Err(EngineError::score(format!(
                "sets {}-{} exceed {} needed to win a best of {}",
                sa,
                sb,
                needed,
                self.format.best_of()
            )));
        }
        if sa == needed && sb == needed {
            return Err(EngineError::score(format!(
                "both players cannot have won the match (sets {}-{})",
                sa, sb
            )));
        }
        if self.is_complete() {
            if self.games != [0, 0] || self.points != [0, 0] {
                return Err(EngineError::score(
                    "a finished match cannot have games or points in progress",
                ));
            }
            return Ok(());
        }

        let [ga, gb] = self.games;
        let (hi, lo) = (ga.max(gb), ga.min(gb));
        if hi > GAMES_PER_SET || (hi == GAMES_PER_SET && lo + 2 <= hi) {
            return Err(EngineError::score(format!(
                "games {}-{} mean the set is already decided",
                ga, gb
            )));
        }

        let [pa, pb] = self.points;
        let (hi, lo) = (pa.max(pb), pa.min(pb));
        if self.in_tiebreak() {
            if hi >= TIEBREAK_POINTS && hi - lo >= 2 {
                return Err(EngineError::score(format!(
                    "tiebreak points {}-{} mean the tiebreak is already decided",
                    pa, pb
                )));
            }
        } else {
            if hi > ADVANTAGE {
                return Err(EngineError::score(format!(
                    "points {}-{} out of range (0-3, or 4 for advantage)",
                    pa, pb
                )));
            }
            if hi == ADVANTAGE && lo != FORTY {
                return Err(EngineError::score(format!(
                    "points {}-{}: advantage is only possible against 40",
                    pa, pb
                )));
            }
        }
        Ok(())
    }

    /// Conventional call of one side's points: "0", "15", "30", "40", "AD"
    /// in a regular game, the raw count in a tiebreak.
    pub fn point_call(&self, side: Side) -> String {
        let p = self.points_of(side);
        if self.in_tiebreak() {
            return p.to_string();
        }
        match p {
            0 => "0".into(),
            1 => "15".into(),
            2 => "30".into(),
            3 => "40".into(),
            _ => "AD".into(),
        }
    }
}

impl fmt::Display for ScoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(winner) = self.winner() {
            return write!(
                f,
                "sets {}-{} (match won by {})",
                self.sets[0], self.sets[1], winner
            );
        }
        write!(
            f,
            "sets {}-{}, games {}-{}, {} {}-{}, {} serving",
            self.sets[0],
            self.sets[1],
            self.games[0],
            self.games[1],
            if self.in_tiebreak() { "tiebreak" } else { "points" },
            self.point_call(Side::A),
            self.point_call(Side::B),
            self.server
        )
    }
}
