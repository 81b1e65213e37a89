use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::{
    MarketEvaluation, MarketInput, PlayerRates, PressureContext, Recommendation, ScoreState,
    SimulationOutcome, Side,
};

/// Court surface a statistics row applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    #[default]
    Hard,
    Clay,
    Grass,
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hard" => Ok(Surface::Hard),
            "clay" => Ok(Surface::Clay),
            "grass" => Ok(Surface::Grass),
            other => Err(format!("unknown surface '{}'", other)),
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Hard => write!(f, "Hard"),
            Surface::Clay => write!(f, "Clay"),
            Surface::Grass => write!(f, "Grass"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Tour {
    #[default]
    Atp,
    Wta,
}

impl FromStr for Tour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atp" => Ok(Tour::Atp),
            "wta" => Ok(Tour::Wta),
            other => Err(format!("unknown tour '{}'", other)),
        }
    }
}

impl fmt::Display for Tour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tour::Atp => write!(f, "ATP"),
            Tour::Wta => write!(f, "WTA"),
        }
    }
}

/// One row of the player statistics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRow {
    pub player: String,
    pub surface: Surface,
    pub tour: Tour,
    pub rates: PlayerRates,
}

/// Everything needed to price one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub player_a: String,
    pub player_b: String,
    #[serde(default)]
    pub surface: Surface,
    #[serde(default)]
    pub tour: Tour,
    pub score: ScoreState,
    pub market: MarketInput,
    /// Rates to use instead of the statistics lookup.
    #[serde(default)]
    pub rates_a: Option<PlayerRates>,
    #[serde(default)]
    pub rates_b: Option<PlayerRates>,
    /// Fail with `StatsNotFound` instead of substituting tour averages.
    #[serde(default)]
    pub require_stats: bool,
    #[serde(default)]
    pub trials: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl MatchRequest {
    pub fn player(&self, side: Side) -> &str {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }

    pub fn rates_override(&self, side: Side) -> Option<PlayerRates> {
        match side {
            Side::A => self.rates_a,
            Side::B => self.rates_b,
        }
    }
}

/// Where the rates used for a player came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Statistics,
    Override,
    TourAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub name: String,
    pub rates: PlayerRates,
    pub rate_source: RateSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub evaluated_at: DateTime<Utc>,
    pub player_a: PlayerReport,
    pub player_b: PlayerReport,
    pub surface: Surface,
    pub tour: Tour,
    pub score: ScoreState,
    pub score_summary: String,
    pub pressure: PressureContext,
    pub pressure_multiplier: f64,
    pub simulation: SimulationOutcome,
    pub market: MarketEvaluation,
    pub recommendation: Recommendation,
}

impl EvaluationReport {
    pub fn player(&self, side: Side) -> &PlayerReport {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} vs {} ({}, {})",
            self.player_a.name, self.player_b.name, self.tour, self.surface
        )?;
        writeln!(f, "Score: {}", self.score_summary)?;
        if self.pressure.is_pressure() {
            writeln!(
                f,
                "Pressure point: {:?} (x{:.2} on serve)",
                self.pressure, self.pressure_multiplier
            )?;
        }
        let sim = &self.simulation;
        writeln!(
            f,
            "Simulated {} of {} trials (±{:.2}% at 95%){}",
            sim.trials_run,
            sim.trials_requested,
            sim.ci95_half_width * 100.0,
            if sim.truncated { " [time budget hit]" } else { "" }
        )?;
        for side in Side::BOTH {
            let p = self.player(side);
            let m = self.market.side(side);
            writeln!(
                f,
                "  {:<24} win {:>6.2}%  odds {:>6.2}  edge {:>+6.2}%  stake {:>9.2}{}{}",
                p.name,
                m.win_prob * 100.0,
                m.back_odds,
                m.edge * 100.0,
                m.stake,
                if m.below_minimum { "  (below minimum)" } else { "" },
                if p.rate_source == RateSource::TourAverage {
                    "  [tour-average rates]"
                } else {
                    ""
                }
            )?;
        }
        match self.recommendation.side() {
            Some(side) => write!(
                f,
                "Recommendation: BACK {} for {:.2} (edge {:+.2}%)",
                self.player(side).name,
                self.market.stake(side),
                self.market.edge(side) * 100.0
            ),
            None => write!(f, "Recommendation: {}", self.recommendation),
        }
    }
}
