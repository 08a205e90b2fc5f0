//! HTTP API for the star node.

use crate::node::StarState;
use crate::ws::ws_stars_handler;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use starbazaar_store::{Star, StarFilter, StarId, StarOrder, StarQuery};
use starbazaar_sync::{
    start_of_local_day, ClaimForm, ClaimProgress, ClaimResult, Claimant, ProgressPhase,
    DAILY_GOAL, DEFAULT_PROJECTION_CAP,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

type AppState = Arc<StarState>;

/// Upper bound on a single batch read.
const MAX_BATCH: usize = 10_000;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health (at root and under /api/v1 for compatibility)
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        // Stars
        .route("/api/v1/stars", get(list_stars))
        .route("/api/v1/stars/:id", get(get_star))
        .route("/api/v1/stars/:id/claim", post(claim_star))
        // Aggregates
        .route("/api/v1/stats", get(get_stats))
        // WebSocket for committed changes
        .route("/api/v1/ws/stars", get(ws_stars_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body returned to clients.
#[derive(Debug, Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }
}

impl From<starbazaar_sync::Error> for ApiError {
    fn from(e: starbazaar_sync::Error) -> Self {
        use starbazaar_sync::Error;
        let status = match &e {
            Error::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
            Error::AlreadyClaimed => StatusCode::CONFLICT,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
        };
        Self::new(status, e.user_message())
    }
}

impl From<starbazaar_store::Error> for ApiError {
    fn from(e: starbazaar_store::Error) -> Self {
        starbazaar_sync::Error::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

// --- Star endpoints ---

#[derive(Debug, Default, Deserialize)]
struct StarsParams {
    limit: Option<usize>,
    /// Message / owner name substring
    q: Option<String>,
    owner: Option<String>,
    claimed: Option<bool>,
    order: Option<StarOrder>,
}

impl StarsParams {
    fn into_query(self) -> StarQuery {
        let mut filter = StarFilter::all();
        filter.is_claimed = self.claimed;
        if let Some(owner) = self.owner.filter(|o| !o.trim().is_empty()) {
            filter = filter.with_owner(owner);
        }
        if let Some(text) = self.q.filter(|q| !q.trim().is_empty()) {
            filter = filter.with_text(text.trim());
        }
        StarQuery::new(filter)
            .order(self.order.unwrap_or_default())
            .limit(self.limit.unwrap_or(DEFAULT_PROJECTION_CAP).min(MAX_BATCH))
    }
}

async fn list_stars(
    State(state): State<AppState>,
    Query(params): Query<StarsParams>,
) -> Result<Json<Vec<Star>>, ApiError> {
    let query = params.into_query();
    let stars = state.store.get_batch(&query).await?;
    debug!("Served {} stars", stars.len());
    Ok(Json(stars))
}

async fn get_star(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Star>, ApiError> {
    match state.store.get_by_id(StarId(id)).await? {
        Some(star) => Ok(Json(star)),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Star #{} does not exist.", id),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    claimant_id: String,
    email: Option<String>,
    #[serde(flatten)]
    form: ClaimForm,
}

async fn claim_star(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<Star>, ApiError> {
    let claimant = Claimant::new(req.claimant_id, req.email)?;
    let Some(star) = state.store.get_by_id(StarId(id)).await? else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Star #{} does not exist.", id),
        ));
    };

    let result = state.coordinator.claim(&star, &claimant, &req.form).await?;
    if let ClaimResult::StoreUnavailable(reason) = &result {
        warn!("Claim on star {} failed: {}", id, reason);
    }
    Ok(Json(result.into_result()?))
}

// --- Stats endpoint ---

#[derive(Debug, Serialize, Deserialize)]
struct StatsResponse {
    total: u64,
    claimed: u64,
    today: u64,
    daily_goal: u64,
    percentage: f64,
    phase: ProgressPhase,
    headline: String,
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let day_start = start_of_local_day(Utc::now());
    let total = state.store.count(&StarFilter::all()).await?;
    let claimed = state.store.count(&StarFilter::claimed(true)).await?;
    let today = state
        .store
        .count(&StarFilter::claimed(true).claimed_since(day_start))
        .await?;

    let progress = ClaimProgress::new(total, claimed);
    let phase = progress.phase();
    Ok(Json(StatsResponse {
        total,
        claimed,
        today,
        daily_goal: DAILY_GOAL,
        percentage: progress.percentage(),
        phase,
        headline: phase.headline().to_string(),
    }))
}
