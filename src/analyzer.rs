use chrono::Utc;
use tracing::{info, warn};

use crate::engine::{evaluate, EngineError, MonteCarloSimulator, PlayerRates, Side};
use crate::models::{EvaluationReport, MatchRequest, PlayerReport, RateSource};
use crate::stats::{StatsCache, StatsTable};

/// Ties the statistics table, the simulator and the staking model together.
///
/// `analyze` is CPU-bound; async callers should run it on a blocking thread.
pub struct Analyzer {
    stats: StatsCache,
    simulator: MonteCarloSimulator,
    /// Rates used when a player has no statistics row.
    default_rates: PlayerRates,
}

impl Analyzer {
    pub fn new(stats: StatsCache, simulator: MonteCarloSimulator, default_rates: PlayerRates) -> Self {
        Analyzer {
            stats,
            simulator,
            default_rates,
        }
    }

    pub fn stats(&self) -> &StatsCache {
        &self.stats
    }

    pub fn simulator(&self) -> &MonteCarloSimulator {
        &self.simulator
    }

    /// Rates for one side: explicit override, then statistics, then defaults.
    fn resolve_rates(
        &self,
        table: &StatsTable,
        req: &MatchRequest,
        side: Side,
    ) -> Result<PlayerReport, EngineError> {
        let name = req.player(side).to_string();

        if let Some(rates) = req.rates_override(side) {
            rates.validate_for(side)?;
            return Ok(PlayerReport {
                name,
                rates,
                rate_source: RateSource::Override,
            });
        }

        match table.lookup(&name, req.surface, req.tour) {
            Ok(rates) => Ok(PlayerReport {
                name,
                rates,
                rate_source: RateSource::Statistics,
            }),
            Err(e) if req.require_stats => Err(e),
            Err(_) => {
                warn!(
                    "No statistics for {} ({}, {}), using default rates {:.2}/{:.2}",
                    name,
                    req.surface,
                    req.tour,
                    self.default_rates.serve_win_prob,
                    self.default_rates.return_win_prob
                );
                Ok(PlayerReport {
                    name,
                    rates: self.default_rates,
                    rate_source: RateSource::TourAverage,
                })
            }
        }
    }

    /// Price one match: resolve rates, simulate from the current score, and
    /// size a stake on whichever side carries value.
    pub fn analyze(&self, req: &MatchRequest) -> Result<EvaluationReport, EngineError> {
        req.score.validate()?;
        req.market.validate()?;

        let table = self.stats.snapshot();
        let player_a = self.resolve_rates(&table, req, Side::A)?;
        let player_b = self.resolve_rates(&table, req, Side::B)?;

        let simulator = self.simulator.with_overrides(req.trials, req.seed);
        let classifier = simulator.classifier();
        let pressure = classifier.context(&req.score);
        let pressure_multiplier = classifier.classify(&req.score);

        let simulation = simulator.simulate(&req.score, &player_a.rates, &player_b.rates)?;
        let market = evaluate(simulation.win_prob_a, &req.market)?;
        let recommendation = market.recommendation;

        info!(
            "{} vs {} [{}]: P(A)={:.4} ({} trials) -> {}",
            player_a.name,
            player_b.name,
            req.score,
            simulation.win_prob_a,
            simulation.trials_run,
            recommendation
        );

        Ok(EvaluationReport {
            evaluated_at: Utc::now(),
            player_a,
            player_b,
            surface: req.surface,
            tour: req.tour,
            score: req.score,
            score_summary: req.score.to_string(),
            pressure,
            pressure_multiplier,
            simulation,
            market,
            recommendation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        KellyMode, MarketInput, MatchFormat, PressureClassifier, PressureContext, Recommendation,
        ScoreState, SimulationOptions,
    };
    use crate::engine::simulator::DEFAULT_MAX_TRIALS;
    use crate::models::{StatsRow, Surface, Tour};
    use approx::assert_relative_eq;

    fn analyzer() -> Analyzer {
        let rows = vec![
            StatsRow {
                player: "Big Server".into(),
                surface: Surface::Grass,
                tour: Tour::Atp,
                rates: PlayerRates::new(0.75, 0.40).unwrap(),
            },
            StatsRow {
                player: "Grinder".into(),
                surface: Surface::Grass,
                tour: Tour::Atp,
                rates: PlayerRates::new(0.58, 0.33).unwrap(),
            },
        ];
        let stats = StatsCache::new(StatsTable::from_rows(rows, None));
        let options = SimulationOptions {
            trials: 4_000,
            workers: 2,
            seed: Some(11),
            time_budget: None,
            ..SimulationOptions::default()
        };
        let simulator = MonteCarloSimulator::new(PressureClassifier::default(), options);
        Analyzer::new(stats, simulator, PlayerRates::TOUR_AVERAGE)
    }

    fn request(a: &str, b: &str) -> MatchRequest {
        MatchRequest {
            player_a: a.into(),
            player_b: b.into(),
            surface: Surface::Grass,
            tour: Tour::Atp,
            score: ScoreState::start(MatchFormat::BestOf3, Side::A),
            market: MarketInput {
                back_odds: [1.9, 1.9],
                bankroll: 1000.0,
                commission_rate: 0.0,
                kelly: KellyMode::Full,
                min_stake: 2.0,
            },
            rates_a: None,
            rates_b: None,
            require_stats: false,
            trials: None,
            seed: None,
        }
    }

    #[test]
    fn stronger_player_is_backed() {
        let report = analyzer().analyze(&request("Big Server", "Grinder")).unwrap();
        assert_eq!(report.player_a.rate_source, RateSource::Statistics);
        assert_eq!(report.player_b.rate_source, RateSource::Statistics);
        assert!(report.simulation.win_prob_a > 0.7);
        assert_eq!(report.recommendation, Recommendation::BackA);
        assert!(report.market.stake(Side::A) > 0.0);
        assert_relative_eq!(
            report.simulation.win_prob_a + report.simulation.win_prob_b,
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn unknown_players_fall_back_to_defaults() {
        let report = analyzer().analyze(&request("Nobody", "Grinder")).unwrap();
        assert_eq!(report.player_a.rate_source, RateSource::TourAverage);
        assert_eq!(report.player_a.rates, PlayerRates::TOUR_AVERAGE);
    }

    #[test]
    fn required_stats_surface_not_found() {
        let mut req = request("Nobody", "Grinder");
        req.require_stats = true;
        let err = analyzer().analyze(&req).unwrap_err();
        assert!(matches!(err, EngineError::StatsNotFound { ref player, .. } if player == "Nobody"));
    }

    #[test]
    fn overrides_win_over_statistics() {
        let mut req = request("Big Server", "Grinder");
        req.rates_a = Some(PlayerRates::new(0.50, 0.30).unwrap());
        let report = analyzer().analyze(&req).unwrap();
        assert_eq!(report.player_a.rate_source, RateSource::Override);
        assert!(report.simulation.win_prob_a < 0.5);
    }

    #[test]
    fn invalid_inputs_are_rejected_before_simulating() {
        let mut req = request("Big Server", "Grinder");
        req.market.back_odds = [1.0, 2.0];
        assert!(matches!(
            analyzer().analyze(&req),
            Err(EngineError::InvalidMarketInput(_))
        ));

        let mut req = request("Big Server", "Grinder");
        req.score.games = [9, 2];
        assert!(matches!(
            analyzer().analyze(&req),
            Err(EngineError::InvalidScoreState(_))
        ));

        let mut req = request("Big Server", "Grinder");
        req.trials = Some(0);
        assert_eq!(
            analyzer().analyze(&req).unwrap_err(),
            EngineError::SimulationUnderflow
        );
    }

    #[test]
    fn oversized_trial_request_is_rejected() {
        let mut req = request("Big Server", "Grinder");
        req.trials = Some(1_000_000_000_000_000);
        let err = analyzer().analyze(&req).unwrap_err();
        assert!(matches!(err, EngineError::TrialLimitExceeded { max, .. } if max == DEFAULT_MAX_TRIALS));
        assert!(err.is_input_error());
    }

    #[test]
    fn request_seed_and_trials_are_honoured() {
        let mut req = request("Big Server", "Grinder");
        req.trials = Some(1_500);
        req.seed = Some(99);
        let a = analyzer();
        let first = a.analyze(&req).unwrap();
        let second = a.analyze(&req).unwrap();
        assert_eq!(first.simulation.trials_run, 1_500);
        assert_eq!(first.simulation.seed, 99);
        assert_eq!(first.simulation, second.simulation);
    }

    #[test]
    fn pressure_is_reported() {
        let mut req = request("Big Server", "Grinder");
        req.score.points = [3, 3];
        let report = analyzer().analyze(&req).unwrap();
        assert_eq!(report.pressure, PressureContext::Deuce);
        assert_relative_eq!(report.pressure_multiplier, 1.05);
        assert_eq!(report.score_summary, req.score.to_string());
    }
}
