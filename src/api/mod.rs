use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::analyzer::Analyzer;
use crate::engine::EngineError;
use crate::models::{EvaluationReport, MatchRequest, Surface, Tour};

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

/// Build the Axum router for the evaluation API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/players", get(players_handler))
        .route("/api/evaluate", post(evaluate_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub players_loaded: usize,
    pub stats_source: Option<String>,
    pub stats_loaded_at: Option<DateTime<Utc>>,
}

/// GET /api/health
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    let table = state.analyzer.stats().snapshot();
    Json(Health {
        status: if table.is_empty() { "degraded" } else { "ok" },
        players_loaded: table.len(),
        stats_source: table.source().map(str::to_string),
        stats_loaded_at: table.loaded_at(),
    })
}

#[derive(Debug, Deserialize)]
pub struct PlayersQuery {
    #[serde(default)]
    pub surface: Surface,
    #[serde(default)]
    pub tour: Tour,
}

/// GET /api/players?surface=clay&tour=wta
async fn players_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlayersQuery>,
) -> Json<Vec<String>> {
    Json(state.analyzer.stats().players(query.surface, query.tour))
}

fn status_for(err: &EngineError) -> StatusCode {
    if err.is_input_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::NOT_FOUND
    }
}

/// POST /api/evaluate
async fn evaluate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<EvaluationReport>, (StatusCode, String)> {
    let analyzer = Arc::clone(&state.analyzer);
    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&request))
        .await
        .map_err(|e| {
            error!("Evaluation task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    result.map(Json).map_err(|e| {
        warn!("Rejected evaluation: {}", e);
        (status_for(&e), e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        MonteCarloSimulator, PlayerRates, PressureClassifier, Recommendation, SimulationOptions,
    };
    use crate::models::StatsRow;
    use crate::stats::{StatsCache, StatsTable};

    fn state() -> Arc<AppState> {
        let rows = vec![
            StatsRow {
                player: "Iga Swiatek".into(),
                surface: Surface::Clay,
                tour: Tour::Wta,
                rates: PlayerRates::new(0.62, 0.52).unwrap(),
            },
            StatsRow {
                player: "Coco Gauff".into(),
                surface: Surface::Clay,
                tour: Tour::Wta,
                rates: PlayerRates::new(0.57, 0.47).unwrap(),
            },
        ];
        let simulator = MonteCarloSimulator::new(
            PressureClassifier::default(),
            SimulationOptions {
                trials: 2_000,
                workers: 2,
                seed: Some(5),
                time_budget: None,
                ..SimulationOptions::default()
            },
        );
        let analyzer = Analyzer::new(
            StatsCache::new(StatsTable::from_rows(rows, Some("test"))),
            simulator,
            PlayerRates::TOUR_AVERAGE,
        );
        Arc::new(AppState {
            analyzer: Arc::new(analyzer),
        })
    }

    fn body(extra: serde_json::Value) -> MatchRequest {
        let mut json = serde_json::json!({
            "player_a": "Iga Swiatek",
            "player_b": "Coco Gauff",
            "surface": "clay",
            "tour": "wta",
            "score": {
                "sets": [0, 0], "games": [0, 0], "points": [0, 0],
                "server": "a", "format": 3
            },
            "market": { "back_odds": [1.8, 2.1], "bankroll": 500.0 }
        });
        if let (Some(base), Some(extra)) = (json.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn health_reports_table() {
        let Json(health) = health_handler(State(state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.players_loaded, 2);
        assert_eq!(health.stats_source.as_deref(), Some("test"));
        assert!(health.stats_loaded_at.is_some());
    }

    #[tokio::test]
    async fn players_filter_by_surface_and_tour() {
        let query = PlayersQuery {
            surface: Surface::Clay,
            tour: Tour::Wta,
        };
        let Json(players) = players_handler(State(state()), Query(query)).await;
        assert_eq!(players, vec!["Coco Gauff", "Iga Swiatek"]);

        let Json(none) = players_handler(State(state()), Query(PlayersQuery {
            surface: Surface::Hard,
            tour: Tour::Wta,
        }))
        .await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn evaluate_returns_a_report() {
        let Json(report) = evaluate_handler(State(state()), Json(body(serde_json::json!({}))))
            .await
            .unwrap();
        assert_eq!(report.player_a.name, "Iga Swiatek");
        assert_eq!(report.simulation.trials_run, 2_000);
        assert!(report.simulation.win_prob_a > 0.5);
        assert_ne!(report.recommendation, Recommendation::BackB);
    }

    #[tokio::test]
    async fn bad_input_is_a_bad_request() {
        let req = body(serde_json::json!({
            "market": { "back_odds": [0.9, 2.1], "bankroll": 500.0 }
        }));
        let (status, message) = evaluate_handler(State(state()), Json(req))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("player A"));
    }

    #[tokio::test]
    async fn oversized_trials_are_a_bad_request() {
        let req = body(serde_json::json!({ "trials": 1_000_000_000_000_000u64 }));
        let (status, message) = evaluate_handler(State(state()), Json(req))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("limit"));
    }

    #[tokio::test]
    async fn empty_table_reports_degraded() {
        let simulator =
            MonteCarloSimulator::new(PressureClassifier::default(), SimulationOptions::default());
        let analyzer = Analyzer::new(StatsCache::default(), simulator, PlayerRates::TOUR_AVERAGE);
        let state = Arc::new(AppState {
            analyzer: Arc::new(analyzer),
        });
        let Json(health) = health_handler(State(state)).await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.players_loaded, 0);
        assert!(health.stats_loaded_at.is_none());
    }

    #[tokio::test]
    async fn missing_required_stats_is_not_found() {
        let req = body(serde_json::json!({
            "player_b": "Unknown Qualifier",
            "require_stats": true
        }));
        let (status, _) = evaluate_handler(State(state()), Json(req))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
