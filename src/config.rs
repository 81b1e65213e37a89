use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::engine::kelly::DEFAULT_MIN_STAKE;
use crate::engine::pressure::DEFAULT_PRESSURE_MULTIPLIER;
use crate::engine::simulator::{DEFAULT_MAX_TRIALS, DEFAULT_TRIALS};
use crate::engine::{
    KellyMode, MarketInput, MatchFormat, MonteCarloSimulator, PlayerRates, PressureClassifier,
    ScoreState, Side, SimulationOptions,
};
use crate::models::{MatchRequest, Surface, Tour};
use crate::stats::DEFAULT_STATS_URL;

/// In-play tennis win probability simulator with Kelly stake sizing
#[derive(Parser, Debug, Clone)]
#[command(name = "tennis-edge", version, about)]
pub struct Config {
    /// Player statistics CSV: a local path or an http(s) URL
    #[arg(long, env = "STATS_SOURCE", default_value = DEFAULT_STATS_URL, global = true)]
    pub stats_source: String,

    /// Monte Carlo trials per evaluation
    #[arg(long, env = "TRIALS", default_value_t = DEFAULT_TRIALS, global = true)]
    pub trials: u64,

    /// Largest trial count a single evaluation may request
    #[arg(long, env = "MAX_TRIALS", default_value_t = DEFAULT_MAX_TRIALS, global = true)]
    pub max_trials: u64,

    /// Simulation threads (defaults to the number of CPUs)
    #[arg(long, env = "WORKERS", global = true)]
    pub workers: Option<usize>,

    /// Fixed base seed for reproducible simulations
    #[arg(long, env = "SEED", global = true)]
    pub seed: Option<u64>,

    /// Stop simulating after this many milliseconds and report a partial estimate
    #[arg(long, env = "TIME_BUDGET_MS", global = true)]
    pub time_budget_ms: Option<u64>,

    /// Multiplier on the server's point probability at pressure points (1.0 disables)
    #[arg(long, env = "PRESSURE_MULTIPLIER", default_value_t = DEFAULT_PRESSURE_MULTIPLIER, global = true)]
    pub pressure_multiplier: f64,

    /// Serve points won for players without statistics
    #[arg(long, env = "DEFAULT_SERVE", default_value_t = PlayerRates::TOUR_AVERAGE.serve_win_prob, global = true)]
    pub default_serve: f64,

    /// Return points won for players without statistics
    #[arg(long, env = "DEFAULT_RETURN", default_value_t = PlayerRates::TOUR_AVERAGE.return_win_prob, global = true)]
    pub default_return: f64,

    /// Stakes below this amount are not recommended
    #[arg(long, env = "MIN_STAKE", default_value_t = DEFAULT_MIN_STAKE, global = true)]
    pub min_stake: f64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Price a single match from its current score
    Evaluate(EvaluateArgs),
    /// List players with statistics for a surface and tour
    Players(PlayersArgs),
    /// Run the HTTP evaluation API
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Player A
    #[arg(long)]
    pub player_a: String,

    /// Player B
    #[arg(long)]
    pub player_b: String,

    #[arg(long, value_enum, default_value_t = Surface::Hard)]
    pub surface: Surface,

    #[arg(long, value_enum, default_value_t = Tour::Atp)]
    pub tour: Tour,

    /// Sets won by A and B
    #[arg(long, num_args = 2, value_names = ["A", "B"], default_values_t = [0u8, 0])]
    pub sets: Vec<u8>,

    /// Games in the current set
    #[arg(long, num_args = 2, value_names = ["A", "B"], default_values_t = [0u8, 0])]
    pub games: Vec<u8>,

    /// Points in the current game (0-3, 4 = advantage; raw counts in a tiebreak)
    #[arg(long, num_args = 2, value_names = ["A", "B"], default_values_t = [0u8, 0])]
    pub points: Vec<u8>,

    /// Player serving the next point
    #[arg(long, value_enum, default_value_t = Side::A)]
    pub server: Side,

    /// Match length (3 or 5 sets)
    #[arg(long, default_value_t = 3, value_parser = parse_best_of)]
    pub best_of: u8,

    /// Decimal back odds for A
    #[arg(long)]
    pub odds_a: f64,

    /// Decimal back odds for B
    #[arg(long)]
    pub odds_b: f64,

    #[arg(long, default_value_t = 1000.0)]
    pub bankroll: f64,

    #[arg(long, value_enum, default_value_t = KellyMode::Full)]
    pub kelly: KellyMode,

    /// Exchange commission on net winnings, in percent
    #[arg(long, default_value_t = 5.0)]
    pub commission_pct: f64,

    /// Override A's serve points won
    #[arg(long, requires = "return_a")]
    pub serve_a: Option<f64>,

    /// Override A's return points won
    #[arg(long, requires = "serve_a")]
    pub return_a: Option<f64>,

    /// Override B's serve points won
    #[arg(long, requires = "return_b")]
    pub serve_b: Option<f64>,

    /// Override B's return points won
    #[arg(long, requires = "serve_b")]
    pub return_b: Option<f64>,

    /// Fail instead of using default rates when a player has no statistics
    #[arg(long)]
    pub require_stats: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlayersArgs {
    #[arg(long, value_enum, default_value_t = Surface::Hard)]
    pub surface: Surface,

    #[arg(long, value_enum, default_value_t = Tour::Atp)]
    pub tour: Tour,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// API listen address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: String,

    /// Statistics reload interval in seconds
    #[arg(long, env = "STATS_RELOAD_SECS", default_value = "21600")]
    pub reload_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.trials == 0 {
            anyhow::bail!("trials must be at least 1");
        }
        if self.trials > self.max_trials {
            anyhow::bail!(
                "trials ({}) must not exceed max_trials ({})",
                self.trials,
                self.max_trials
            );
        }
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }
        if !self.min_stake.is_finite() || self.min_stake < 0.0 {
            anyhow::bail!("min_stake must be zero or positive");
        }
        PressureClassifier::new(self.pressure_multiplier)?;
        self.default_rates()?;
        if let Command::Serve(args) = &self.command {
            if args.reload_secs == 0 {
                anyhow::bail!("reload_secs must be positive");
            }
        }
        Ok(())
    }

    pub fn simulation_options(&self) -> SimulationOptions {
        let defaults = SimulationOptions::default();
        SimulationOptions {
            trials: self.trials,
            max_trials: self.max_trials,
            workers: self.workers.unwrap_or(defaults.workers),
            seed: self.seed,
            time_budget: self.time_budget_ms.map(Duration::from_millis),
        }
    }

    pub fn default_rates(&self) -> anyhow::Result<PlayerRates> {
        Ok(PlayerRates::new(self.default_serve, self.default_return)?)
    }

    pub fn build_simulator(&self) -> anyhow::Result<MonteCarloSimulator> {
        let classifier = PressureClassifier::new(self.pressure_multiplier)?;
        Ok(MonteCarloSimulator::new(classifier, self.simulation_options()))
    }
}

fn parse_best_of(s: &str) -> Result<u8, String> {
    let n: u8 = s.parse().map_err(|e| format!("{}", e))?;
    MatchFormat::try_from(n).map(u8::from).map_err(|e| e.to_string())
}

fn pair(values: &[u8], what: &str) -> anyhow::Result<[u8; 2]> {
    match values {
        [a, b] => Ok([*a, *b]),
        _ => anyhow::bail!("--{} takes exactly two values", what),
    }
}

fn rate_override(serve: Option<f64>, ret: Option<f64>) -> anyhow::Result<Option<PlayerRates>> {
    match (serve, ret) {
        (Some(s), Some(r)) => Ok(Some(PlayerRates::new(s, r)?)),
        (None, None) => Ok(None),
        _ => anyhow::bail!("serve and return overrides must be given together"),
    }
}

impl EvaluateArgs {
    pub fn to_request(&self, min_stake: f64) -> anyhow::Result<MatchRequest> {
        let format = MatchFormat::try_from(self.best_of)?;
        let score = ScoreState::new(
            pair(&self.sets, "sets")?,
            pair(&self.games, "games")?,
            pair(&self.points, "points")?,
            self.server,
            format,
        )?;
        if !(0.0..100.0).contains(&self.commission_pct) {
            anyhow::bail!("commission_pct must be in [0, 100)");
        }
        let market = MarketInput {
            back_odds: [self.odds_a, self.odds_b],
            bankroll: self.bankroll,
            commission_rate: self.commission_pct / 100.0,
            kelly: self.kelly,
            min_stake,
        };
        market.validate()?;

        Ok(MatchRequest {
            player_a: self.player_a.clone(),
            player_b: self.player_b.clone(),
            surface: self.surface,
            tour: self.tour,
            score,
            market,
            rates_a: rate_override(self.serve_a, self.return_a)?,
            rates_b: rate_override(self.serve_b, self.return_b)?,
            require_stats: self.require_stats,
            trials: None,
            seed: None,
        })
    }
}
