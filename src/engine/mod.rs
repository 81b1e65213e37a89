pub mod error;
pub mod kelly;
pub mod pressure;
pub mod rates;
pub mod resolver;
pub mod score;
pub mod simulator;

pub use error::EngineError;
pub use kelly::{evaluate, KellyMode, MarketEvaluation, MarketInput, Recommendation};
pub use pressure::{PressureClassifier, PressureContext};
pub use rates::PlayerRates;
pub use score::{MatchFormat, ScoreState, Side};
pub use simulator::{MonteCarloSimulator, SimulationOptions, SimulationOutcome};
