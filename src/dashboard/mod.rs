use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::collector::{retrain, RetrainSettings};
use crate::config::today;
use crate::db::Database;
use crate::matchday::Matchday;
use crate::model::Predictor;
use crate::stats_api::StatsSource;

/// Shared state of the JSON API. Lookups and the predictor sit behind async
/// mutexes, so requests reaching the upstream are still issued one at a time.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn StatsSource>,
    pub matchday: Arc<Mutex<Matchday>>,
    pub predictor: Arc<Mutex<Predictor>>,
    pub db: Database,
    pub retrain: RetrainSettings,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Build the Axum router for the JSON API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/matchups", get(matchups_handler))
        .route("/api/predict/:game_pk", get(predict_handler))
        .route("/api/retrain", post(retrain_handler))
        .route("/api/training-runs", get(training_runs_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!("API request failed: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}

/// GET /api/matchups?date=YYYY-MM-DD
async fn matchups_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DateQuery>,
) -> impl IntoResponse {
    let date = q.date.unwrap_or_else(today);
    let matchups = state.matchday.lock().await.matchups_on(date).await;
    Json(matchups)
}

/// GET /api/predict/:game_pk?date=YYYY-MM-DD
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    Path(game_pk): Path<u64>,
    Query(q): Query<DateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let date = q.date.unwrap_or_else(today);
    let mut matchday = state.matchday.lock().await;
    let matchup = matchday.find_matchup(date, game_pk).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("no game {} scheduled on {}", game_pk, date),
        )
    })?;

    let mut predictor = state.predictor.lock().await;
    matchday
        .report(&matchup, Some(&mut *predictor))
        .await
        .map(Json)
        .map_err(internal)
}

/// POST /api/retrain
async fn retrain_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    info!("Retrain requested over the API");
    let mut predictor = state.predictor.lock().await;
    retrain(
        state.source.as_ref(),
        &state.db,
        &mut predictor,
        state.retrain,
        today(),
    )
    .await
    .map(Json)
    .map_err(internal)
}

/// GET /api/training-runs?limit=20
async fn training_runs_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LimitQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_training_runs(q.limit.unwrap_or(20).clamp(1, 500))
        .map(Json)
        .map_err(internal)
}
