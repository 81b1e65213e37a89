//! Kelly Criterion stake sizing for back bets at decimal odds.
//!
//! Each side is priced independently from its simulated win probability:
//!   f* = (b·p − q) / b
//! where
//!   b  = net odds received on the bet after commission,
//!        (back_odds − 1) · (1 − commission_rate)
//!   p  = estimated probability of winning
//!   q  = 1 − p  (probability of losing)
//!
//! A *fractional* Kelly multiplier (full = 1.0, half = 0.5) trades a little
//! growth for lower variance. Stakes under the venue minimum are dropped to
//! zero rather than rounded up to the minimum.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::EngineError;
use super::score::Side;

/// Smallest stake the venue accepts, in currency units.
pub const DEFAULT_MIN_STAKE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KellyMode {
    #[default]
    Full,
    Half,
}

impl KellyMode {
    pub fn fraction(self) -> f64 {
        match self {
            KellyMode::Full => 1.0,
            KellyMode::Half => 0.5,
        }
    }
}

fn default_min_stake() -> f64 {
    DEFAULT_MIN_STAKE
}

/// Odds, bankroll and venue terms for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketInput {
    /// Decimal back odds for A and B.
    pub back_odds: [f64; 2],
    pub bankroll: f64,
    /// Commission charged on net winnings, as a fraction (0.05 = 5%).
    #[serde(default)]
    pub commission_rate: f64,
    #[serde(default)]
    pub kelly: KellyMode,
    #[serde(default = "default_min_stake")]
    pub min_stake: f64,
}

impl MarketInput {
    pub fn validate(&self) -> Result<(), EngineError> {
        for side in Side::BOTH {
            let odds = self.back_odds[side.index()];
            if !odds.is_finite() || odds <= 1.0 {
                return Err(EngineError::market(
                    side,
                    format!("back odds must be greater than 1.0, got {}", odds),
                ));
            }
        }
        if !self.bankroll.is_finite() || self.bankroll < 0.0 {
            return Err(EngineError::InvalidMarketInput(format!(
                "bankroll must be non-negative, got {}",
                self.bankroll
            )));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(EngineError::InvalidMarketInput(format!(
                "commission rate must be in [0, 1), got {}",
                self.commission_rate
            )));
        }
        if !self.min_stake.is_finite() || self.min_stake < 0.0 {
            return Err(EngineError::InvalidMarketInput(format!(
                "minimum stake must be non-negative, got {}",
                self.min_stake
            )));
        }
        Ok(())
    }
}

/// Market-implied probability of decimal `back_odds`.
pub fn implied_probability(back_odds: f64) -> f64 {
    1.0 / back_odds
}

/// Net profit per unit staked on a win, after commission.
pub fn net_odds(back_odds: f64, commission_rate: f64) -> f64 {
    (back_odds - 1.0) * (1.0 - commission_rate)
}

/// Edge = win_prob − break-even probability.
///
/// With zero commission the break-even probability is `1 / back_odds`.
pub fn edge(win_prob: f64, back_odds: f64, commission_rate: f64) -> f64 {
    let b = net_odds(back_odds, commission_rate);
    win_prob - implied_probability(1.0 + b)
}

/// Expected profit per unit staked: b·p − q.
pub fn expected_value(win_prob: f64, net_odds: f64) -> f64 {
    net_odds * win_prob - (1.0 - win_prob)
}

/// Full Kelly fraction f* = (b·p − q) / b, clamped to ≥ 0.
pub fn kelly_fraction(win_prob: f64, net_odds: f64) -> f64 {
    if net_odds <= 0.0 {
        return 0.0;
    }
    (expected_value(win_prob, net_odds) / net_odds).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    BackA,
    BackB,
    /// A side with positive edge has a nonzero Kelly stake under the venue minimum.
    StakeBelowMinimum,
    NoValueBet,
}

impl Recommendation {
    pub fn back(side: Side) -> Self {
        match side {
            Side::A => Recommendation::BackA,
            Side::B => Recommendation::BackB,
        }
    }

    pub fn side(self) -> Option<Side> {
        match self {
            Recommendation::BackA => Some(Side::A),
            Recommendation::BackB => Some(Side::B),
            _ => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::BackA => write!(f, "back A"),
            Recommendation::BackB => write!(f, "back B"),
            Recommendation::StakeBelowMinimum => write!(f, "no bet (stake below minimum)"),
            Recommendation::NoValueBet => write!(f, "no value bet"),
        }
    }
}

/// Pricing and sizing for backing one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SideEvaluation {
    pub side: Side,
    pub win_prob: f64,
    pub back_odds: f64,
    pub implied_prob: f64,
    pub net_odds: f64,
    pub edge: f64,
    pub expected_value: f64,
    /// Full Kelly fraction before the fractional multiplier.
    pub kelly_fraction: f64,
    /// Stake the formula asks for, before the minimum is enforced.
    pub raw_stake: f64,
    pub stake: f64,
    pub below_minimum: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketEvaluation {
    pub player_a: SideEvaluation,
    pub player_b: SideEvaluation,
    pub recommendation: Recommendation,
}

impl MarketEvaluation {
    pub fn side(&self, side: Side) -> &SideEvaluation {
        match side {
            Side::A => &self.player_a,
            Side::B => &self.player_b,
        }
    }

    pub fn edge(&self, side: Side) -> f64 {
        self.side(side).edge
    }

    pub fn stake(&self, side: Side) -> f64 {
        self.side(side).stake
    }
}

/// Price both sides of the match and pick at most one bet.
///
/// `win_prob_a` is A's estimated match win probability; B gets the
/// complement.
pub fn evaluate(win_prob_a: f64, market: &MarketInput) -> Result<MarketEvaluation, EngineError> {
    if !(0.0..=1.0).contains(&win_prob_a) {
        return Err(EngineError::InvalidMarketInput(format!(
            "win probability must be in [0, 1], got {}",
            win_prob_a
        )));
    }
    market.validate()?;

    let player_a = price_side(Side::A, win_prob_a, market);
    let player_b = price_side(Side::B, 1.0 - win_prob_a, market);

    let mut candidates: Vec<&SideEvaluation> =
        [&player_a, &player_b].into_iter().filter(|s| s.edge > 0.0).collect();
    candidates.sort_by(|x, y| y.edge.total_cmp(&x.edge));

    let recommendation = match candidates.iter().find(|s| s.stake > 0.0) {
        Some(best) => Recommendation::back(best.side),
        None if candidates.iter().any(|s| s.below_minimum) => Recommendation::StakeBelowMinimum,
        None => Recommendation::NoValueBet,
    };

    Ok(MarketEvaluation {
        player_a,
        player_b,
        recommendation,
    })
}

fn price_side(side: Side, win_prob: f64, market: &MarketInput) -> SideEvaluation {
    let back_odds = market.back_odds[side.index()];
    let b = net_odds(back_odds, market.commission_rate);
    let f = kelly_fraction(win_prob, b);
    let raw_stake = f * market.bankroll * market.kelly.fraction();
    let below_minimum = raw_stake > 0.0 && raw_stake < market.min_stake;
    let stake = if raw_stake >= market.min_stake && raw_stake > 0.0 {
        raw_stake
    } else {
        0.0
    };
    SideEvaluation {
        side,
        win_prob,
        back_odds,
        implied_prob: implied_probability(back_odds),
        net_odds: b,
        edge: edge(win_prob, back_odds, market.commission_rate),
        expected_value: expected_value(win_prob, b),
        kelly_fraction: f,
        raw_stake,
        stake,
        below_minimum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn market(odds_a: f64, odds_b: f64, bankroll: f64) -> MarketInput {
        MarketInput {
            back_odds: [odds_a, odds_b],
            bankroll,
            commission_rate: 0.0,
            kelly: KellyMode::Full,
            min_stake: DEFAULT_MIN_STAKE,
        }
    }

    #[test]
    fn test_kelly_positive_edge_example() {
        // p = 0.55 at evens: b = 1, f* = (0.55 - 0.45) / 1 = 0.10
        let eval = evaluate(0.55, &market(2.0, 2.0, 1000.0)).unwrap();
        let a = eval.player_a;
        assert_relative_eq!(a.edge, 0.05, epsilon = 1e-9);
        assert_relative_eq!(a.net_odds, 1.0, epsilon = 1e-12);
        assert_relative_eq!(a.kelly_fraction, 0.10, epsilon = 1e-9);
        assert_relative_eq!(a.stake, 100.0, epsilon = 1e-6);
        assert_eq!(eval.recommendation, Recommendation::BackA);
        assert_eq!(eval.stake(Side::B), 0.0);
    }

    #[test]
    fn test_kelly_no_edge() {
        let eval = evaluate(0.45, &market(2.0, 1.5, 1000.0)).unwrap();
        assert_relative_eq!(eval.edge(Side::A), -0.05, epsilon = 1e-9);
        assert_eq!(eval.stake(Side::A), 0.0);
        assert!(!eval.player_a.below_minimum);
        // B: 0.55 vs 1/1.5 = 0.667 → also negative
        assert!(eval.edge(Side::B) < 0.0);
        assert_eq!(eval.recommendation, Recommendation::NoValueBet);
    }

    #[test]
    fn test_stake_below_minimum_is_zeroed() {
        // f* = 0.10 on a bankroll of 12 → 1.20 < 2.00 minimum
        let eval = evaluate(0.55, &market(2.0, 2.0, 12.0)).unwrap();
        let a = eval.player_a;
        assert_relative_eq!(a.raw_stake, 1.2, epsilon = 1e-9);
        assert_eq!(a.stake, 0.0);
        assert!(a.below_minimum);
        assert_eq!(eval.recommendation, Recommendation::StakeBelowMinimum);
    }

    #[test]
    fn test_half_kelly() {
        let mut m = market(2.0, 2.0, 1000.0);
        m.kelly = KellyMode::Half;
        let eval = evaluate(0.55, &m).unwrap();
        assert_relative_eq!(eval.stake(Side::A), 50.0, epsilon = 1e-6);
    }

    #[test]
    fn test_commission_reduces_payoff() {
        let mut m = market(2.0, 2.0, 1000.0);
        m.commission_rate = 0.05;
        let eval = evaluate(0.55, &m).unwrap();
        let a = eval.player_a;
        assert_relative_eq!(a.net_odds, 0.95, epsilon = 1e-12);
        // break-even 1 / 1.95
        assert_relative_eq!(a.edge, 0.55 - 1.0 / 1.95, epsilon = 1e-12);
        // f* = (0.95 * 0.55 - 0.45) / 0.95
        assert_relative_eq!(a.kelly_fraction, (0.5225 - 0.45) / 0.95, epsilon = 1e-12);
        assert!(a.stake < 100.0);
    }

    #[test]
    fn test_commission_can_erase_thin_edge() {
        let mut m = market(2.0, 2.0, 1000.0);
        m.commission_rate = 0.10;
        let eval = evaluate(0.51, &m).unwrap();
        assert!(eval.edge(Side::A) < 0.0);
        assert_eq!(eval.recommendation, Recommendation::NoValueBet);
    }

    #[test]
    fn test_backs_b_when_a_is_overpriced() {
        let eval = evaluate(0.30, &market(1.5, 2.5, 1000.0)).unwrap();
        assert!(eval.edge(Side::B) > 0.0);
        assert_eq!(eval.recommendation, Recommendation::BackB);
        assert_eq!(eval.recommendation.side(), Some(Side::B));
    }

    #[test]
    fn test_larger_edge_wins_when_both_positive() {
        // Overround below 1: both sides show value, B more so.
        let eval = evaluate(0.45, &market(2.4, 2.4, 1000.0)).unwrap();
        assert!(eval.edge(Side::A) > 0.0 && eval.edge(Side::B) > 0.0);
        assert_eq!(eval.recommendation, Recommendation::BackB);
    }

    #[test]
    fn test_kelly_fraction_clamped() {
        assert_eq!(kelly_fraction(0.3, 1.0), 0.0);
        assert_eq!(kelly_fraction(0.9, 0.0), 0.0);
        assert_relative_eq!(kelly_fraction(0.6, 1.0), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_edge_without_commission_uses_implied_probability() {
        assert_relative_eq!(edge(0.6, 2.0, 0.0), 0.1, epsilon = 1e-12);
        assert_relative_eq!(implied_probability(4.0), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_market_input() {
        assert!(evaluate(0.5, &market(1.0, 2.0, 100.0)).is_err());
        assert!(evaluate(0.5, &market(2.0, 0.9, 100.0)).is_err());
        assert!(evaluate(0.5, &market(2.0, 2.0, -1.0)).is_err());
        assert!(evaluate(1.5, &market(2.0, 2.0, 100.0)).is_err());
        let mut m = market(2.0, 2.0, 100.0);
        m.commission_rate = 1.0;
        assert!(matches!(evaluate(0.5, &m), Err(EngineError::InvalidMarketInput(_))));
    }

    #[test]
    fn test_zero_bankroll_is_no_value_bet() {
        let eval = evaluate(0.7, &market(2.0, 2.0, 0.0)).unwrap();
        assert_eq!(eval.stake(Side::A), 0.0);
        assert!(!eval.player_a.below_minimum);
        assert_eq!(eval.recommendation, Recommendation::NoValueBet);

        let mut m = market(2.0, 2.0, 0.0);
        m.min_stake = 0.0;
        let eval = evaluate(0.7, &m).unwrap();
        assert!(!eval.player_a.below_minimum && !eval.player_b.below_minimum);
        assert_eq!(eval.recommendation, Recommendation::NoValueBet);
    }

    #[test]
    fn test_below_minimum_label_matches_side_flags() {
        let eval = evaluate(0.55, &market(2.0, 2.0, 12.0)).unwrap();
        assert_eq!(eval.recommendation, Recommendation::StakeBelowMinimum);
        assert!(eval.player_a.below_minimum || eval.player_b.below_minimum);
    }

    #[test]
    fn test_market_input_serde_defaults() {
        let m: MarketInput =
            serde_json::from_str(r#"{"back_odds":[1.8,2.1],"bankroll":500.0}"#).unwrap();
        assert_eq!(m.kelly, KellyMode::Full);
        assert_eq!(m.commission_rate, 0.0);
        assert_eq!(m.min_stake, DEFAULT_MIN_STAKE);
        assert_eq!(
            serde_json::to_value(Recommendation::StakeBelowMinimum).unwrap(),
            "stake_below_minimum"
        );
    }
}
