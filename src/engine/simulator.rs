//! Monte Carlo estimate of match win probability from an arbitrary score.
//!
//! Each trial copies the starting [`ScoreState`] and plays points until the
//! match is decided:
//!
//!   p_point = clamp(s / (s + r) × pressure(state), 0.01, 0.99)
//!
//! where `s` is the server's serve rate and `r` the returner's return rate.
//! Trials are split into fixed-size shards run on a rayon pool. Every shard
//! owns its own `StdRng`, seeded from the base seed and the shard index, and
//! only win counts are combined, so a seed and a trial count reproduce the
//! same estimate on any machine and with any number of worker threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::error::EngineError;
use super::pressure::PressureClassifier;
use super::rates::{serve_point_probability, PlayerRates};
use super::resolver::resolve_point;
use super::score::{ScoreState, Side};

pub const DEFAULT_TRIALS: u64 = 100_000;
/// Upper bound on trials a single evaluation may request.
pub const DEFAULT_MAX_TRIALS: u64 = 5_000_000;

/// Bounds on the per-point probability. Keeping every point a genuine
/// contest guarantees tiebreaks and deuce games terminate.
const MIN_POINT_PROB: f64 = 0.01;
const MAX_POINT_PROB: f64 = 0.99;

/// Trials a shard plays between wall-clock checks.
const CHUNK_TRIALS: u64 = 1024;

/// Trials per shard. Independent of the thread count so the shard layout,
/// and with it the estimate, depends only on the trial count.
const SHARD_TRIALS: u64 = 4 * CHUNK_TRIALS;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    pub trials: u64,
    /// Largest trial count accepted, including per-request overrides.
    pub max_trials: u64,
    /// Threads the shards are spread over.
    pub workers: usize,
    /// Base seed; a random one is drawn (and reported) when absent.
    pub seed: Option<u64>,
    /// Stop early and report the partial estimate once this much wall-clock
    /// time has passed.
    pub time_budget: Option<Duration>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        SimulationOptions {
            trials: DEFAULT_TRIALS,
            max_trials: DEFAULT_MAX_TRIALS,
            workers: rayon::current_num_threads(),
            seed: None,
            time_budget: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutcome {
    pub win_prob_a: f64,
    pub win_prob_b: f64,
    pub trials_requested: u64,
    /// Trials actually played; lower than requested when the time budget ran out.
    pub trials_run: u64,
    pub truncated: bool,
    pub seed: u64,
    /// Half-width of the 95% normal-approximation confidence interval.
    pub ci95_half_width: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ShardTally {
    wins_a: u64,
    trials: u64,
}

#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    classifier: PressureClassifier,
    options: SimulationOptions,
    /// Dedicated pool when `workers` differs from the global rayon pool.
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl MonteCarloSimulator {
    pub fn new(classifier: PressureClassifier, options: SimulationOptions) -> Self {
        let pool = if options.workers > 0 && options.workers != rayon::current_num_threads() {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(options.workers)
                .build()
            {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    warn!(
                        "Could not build a {}-thread simulation pool, using the global pool: {}",
                        options.workers, e
                    );
                    None
                }
            }
        } else {
            None
        };
        MonteCarloSimulator {
            classifier,
            options,
            pool,
        }
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn classifier(&self) -> &PressureClassifier {
        &self.classifier
    }

    /// Same simulator with a different trial count and/or seed.
    pub fn with_overrides(&self, trials: Option<u64>, seed: Option<u64>) -> Self {
        let mut sim = self.clone();
        if let Some(t) = trials {
            sim.options.trials = t;
        }
        if seed.is_some() {
            sim.options.seed = seed;
        }
        sim
    }

    /// Estimate the probability that player A wins the match from `initial`.
    pub fn simulate(
        &self,
        initial: &ScoreState,
        rates_a: &PlayerRates,
        rates_b: &PlayerRates,
    ) -> Result<SimulationOutcome, EngineError> {
        let trials = self.options.trials;
        if trials == 0 {
            return Err(EngineError::SimulationUnderflow);
        }
        if trials > self.options.max_trials {
            return Err(EngineError::TrialLimitExceeded {
                requested: trials,
                max: self.options.max_trials,
            });
        }
        initial.validate()?;
        rates_a.validate_for(Side::A)?;
        rates_b.validate_for(Side::B)?;

        let seed = self
            .options
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen());
        let deadline = self.options.time_budget.map(|d| Instant::now() + d);
        let started = Instant::now();

        let run = || {
            plan_shards(trials)
                .into_par_iter()
                .enumerate()
                .map(|(index, shard_trials)| {
                    self.run_shard(
                        initial,
                        rates_a,
                        rates_b,
                        shard_trials,
                        index as u64,
                        seed,
                        deadline,
                    )
                })
                .reduce(ShardTally::default, |x, y| ShardTally {
                    wins_a: x.wins_a + y.wins_a,
                    trials: x.trials + y.trials,
                })
        };
        let tally = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let p = tally.wins_a as f64 / tally.trials as f64;
        let outcome = SimulationOutcome {
            win_prob_a: p,
            win_prob_b: 1.0 - p,
            trials_requested: trials,
            trials_run: tally.trials,
            truncated: tally.trials < trials,
            seed,
            ci95_half_width: 1.96 * (p * (1.0 - p) / tally.trials as f64).sqrt(),
        };
        debug!(
            "Simulated {}/{} trials from [{}] in {:?}: P(A)={:.4}",
            outcome.trials_run,
            trials,
            initial,
            started.elapsed(),
            p
        );
        Ok(outcome)
    }

    /// Server's chance of winning the next point at `state`.
    pub fn point_probability(
        &self,
        state: &ScoreState,
        rates_a: &PlayerRates,
        rates_b: &PlayerRates,
    ) -> f64 {
        let (server, returner) = match state.server {
            Side::A => (rates_a, rates_b),
            Side::B => (rates_b, rates_a),
        };
        let p = serve_point_probability(server, returner) * self.classifier.classify(state);
        p.clamp(MIN_POINT_PROB, MAX_POINT_PROB)
    }

    fn run_shard(
        &self,
        initial: &ScoreState,
        rates_a: &PlayerRates,
        rates_b: &PlayerRates,
        trials: u64,
        index: u64,
        base_seed: u64,
        deadline: Option<Instant>,
    ) -> ShardTally {
        let mut rng = StdRng::seed_from_u64(shard_seed(base_seed, index));
        let mut tally = ShardTally::default();
        while tally.trials < trials {
            // shard 0 always plays one chunk so a spent budget still yields an estimate
            let must_play = index == 0 && tally.trials == 0;
            if !must_play && deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            let chunk = CHUNK_TRIALS.min(trials - tally.trials);
            for _ in 0..chunk {
                if self.play_out(*initial, rates_a, rates_b, &mut rng) == Side::A {
                    tally.wins_a += 1;
                }
            }
            tally.trials += chunk;
        }
        tally
    }

    fn play_out(
        &self,
        mut state: ScoreState,
        rates_a: &PlayerRates,
        rates_b: &PlayerRates,
        rng: &mut StdRng,
    ) -> Side {
        loop {
            if let Some(winner) = state.winner() {
                return winner;
            }
            let p = self.point_probability(&state, rates_a, rates_b);
            state = resolve_point(&state, p, rng);
        }
    }
}

/// Split `trials` into shards of [`SHARD_TRIALS`]; the last one takes the
/// remainder.
fn plan_shards(trials: u64) -> Vec<u64> {
    let full = trials / SHARD_TRIALS;
    let rem = trials % SHARD_TRIALS;
    let mut shards = vec![SHARD_TRIALS; full as usize];
    if rem > 0 {
        shards.push(rem);
    }
    shards
}

/// Decorrelated per-shard seed (splitmix64 finaliser).
fn shard_seed(base: u64, index: u64) -> u64 {
    let mut z = base ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
