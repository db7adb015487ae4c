//! HTTP route handlers for the spot ranking API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::ranking::{Coordinate, ErrorKind, RankQuery, RankedResult, RankingError};

use super::state::AppState;

/// Create the API router with all routes.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/search/semantic", post(semantic_search))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "message": "spotrank semantic search API"
    }))
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "spotrank",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Semantic search request.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text description of the wanted spot.
    pub query: String,
    /// User latitude.
    pub lat: Option<f64>,
    /// User longitude.
    pub lon: Option<f64>,
    /// Accepted for compatibility; not applied.
    pub radius_km: Option<f64>,
    /// Number of results wanted.
    pub top_k: Option<i64>,
    /// Accepted for compatibility; not applied.
    pub filters: Option<Value>,
}

/// Semantic search response.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Echo of the query text.
    pub query: String,
    /// Ranked results, best first.
    pub results: Vec<SearchResultDto>,
    /// Number of results.
    pub count: usize,
    /// Candidates skipped because their stored metadata was unusable.
    pub dropped_candidates: usize,
}

/// One ranked spot.
#[derive(Debug, Serialize)]
pub struct SearchResultDto {
    /// Spot identifier.
    pub id: String,
    /// Spot title.
    pub title: Option<String>,
    /// Spot description.
    pub description: Option<String>,
    /// Category tags.
    pub category_tags: Vec<String>,
    /// Spot latitude.
    pub lat: Option<f64>,
    /// Spot longitude.
    pub lon: Option<f64>,
    /// Distance to the user, `null` when unknown.
    pub distance_km: Option<f64>,
    /// Similarity reported by the index.
    pub semantic_score: f64,
    /// Stored traffic estimate.
    pub traffic_estimate: Option<f64>,
    /// Stored traffic confidence label.
    pub traffic_confidence: Option<String>,
    /// Blended score used for ordering.
    pub final_score: f64,
}

impl From<RankedResult> for SearchResultDto {
    fn from(r: RankedResult) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            category_tags: r.category_tags,
            lat: r.coordinate.map(|c| c.lat),
            lon: r.coordinate.map(|c| c.lon),
            distance_km: r.distance_km,
            semantic_score: r.semantic_score,
            traffic_estimate: r.traffic_estimate,
            traffic_confidence: r.traffic_confidence,
            final_score: r.final_score,
        }
    }
}

/// Error returned to HTTP clients as `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<RankingError> for ApiError {
    fn from(err: RankingError) -> Self {
        let status = match err.kind() {
            ErrorKind::Request => StatusCode::BAD_REQUEST,
            ErrorKind::Collaborator => StatusCode::BAD_GATEWAY,
            ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn parse_location(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Coordinate>, ApiError> {
    match (lat, lon) {
        (None, None) => Ok(None),
        (Some(lat), Some(lon)) => {
            let location = Coordinate::new(lat, lon);
            if location.is_valid() {
                Ok(Some(location))
            } else {
                Err(ApiError::bad_request(
                    "lat must be within [-90, 90] and lon within [-180, 180]",
                ))
            }
        }
        _ => Err(ApiError::bad_request("lat and lon must be provided together")),
    }
}

/// Handle semantic search requests.
async fn semantic_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("semantic_search", %request_id);

    async move {
        let location = parse_location(request.lat, request.lon)?;
        if request.radius_km.is_some() || request.filters.is_some() {
            tracing::debug!("radius_km and filters are ignored");
        }

        let mut query = RankQuery::new(request.query.clone());
        query.location = location;
        query.top_k = request.top_k;

        let cancel = state.shutdown.child_token();
        let outcome = state.pipeline.rank(&query, &cancel).await.map_err(|err| {
            tracing::warn!(error = %err, "semantic search failed");
            ApiError::from(err)
        })?;

        let results: Vec<SearchResultDto> =
            outcome.results.into_iter().map(SearchResultDto::from).collect();
        let count = results.len();

        Ok(Json(SearchResponse {
            query: request.query,
            results,
            count,
            dropped_candidates: outcome.dropped,
        }))
    }
    .instrument(span)
    .await
}
