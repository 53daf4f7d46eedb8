pub mod config;
pub mod logging;
pub mod tracking;

use axum::{
    Json, Router, async_trait,
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State, rejection::QueryRejection},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use tracking::clock::{now_epoch_seconds, parse_timezone};
use tracking::{GpsPoint, SessionSnapshot, TrackingError, WorkoutTracker};

/// Header carrying the caller's user id. Authentication happens upstream.
pub const OWNER_HEADER: &str = "x-user-id";

pub fn build_app(tracker: WorkoutTracker) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(start_session).get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/points", post(add_points))
        .route("/sessions/:id/pause", post(pause_session))
        .route("/sessions/:id/resume", post(resume_session))
        .route("/sessions/:id/finish", post(finish_session))
        .route("/sessions/:id/trajectory", get(get_trajectory))
        .route("/sessions/:id/route", get(get_route))
        .layer(TraceLayer::new_for_http())
        .with_state(tracker)
}

#[derive(Debug)]
pub enum ApiError {
    Tracking(TrackingError),
    BadRequest(String),
}

impl From<TrackingError> for ApiError {
    fn from(err: TrackingError) -> Self {
        ApiError::Tracking(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
            ApiError::Tracking(err) => {
                let status = match &err {
                    TrackingError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
                    TrackingError::InvalidState { .. } => StatusCode::CONFLICT,
                    TrackingError::Validation { .. } => StatusCode::BAD_REQUEST,
                    TrackingError::CorruptState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                    TrackingError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                if status.is_server_error() {
                    error!(code = err.code(), "request failed: {err}");
                }
                (status, err.code(), err.to_string())
            }
        };
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Caller identity taken from [`OWNER_HEADER`].
pub struct Owner(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Owner(value.to_string()))
            .ok_or_else(|| ApiError::BadRequest(format!("missing {OWNER_HEADER} header")))
    }
}

/// Decode an optional JSON body; an empty body yields `T::default()`.
fn decode_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| ApiError::BadRequest(format!("invalid JSON body: {err}")))
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    workout_type: String,
    start_time: Option<f64>,
    /// Display zone as hours east of UTC. Wins over `timezone`.
    timezone_offset_hours: Option<f64>,
    /// Display zone as a `UTC±h` label.
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PointsRequest {
    #[serde(default)]
    points: Vec<GpsPoint>,
}

#[derive(Debug, Serialize)]
struct PointsResponse {
    points_added: usize,
}

#[derive(Debug, Default, Deserialize)]
struct TransitionRequest {
    at: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FinishRequest {
    end_time: Option<f64>,
    weight_kg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RouteQuery {
    budget: Option<usize>,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn start_session(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let request: StartRequest = decode_body(&body)?;
    let start_time = request.start_time.unwrap_or_else(now_epoch_seconds);
    let utc_offset_hours = match (request.timezone_offset_hours, request.timezone.as_deref()) {
        (Some(hours), _) => Some(hours),
        (None, Some(label)) => Some(parse_timezone(label)?),
        (None, None) => None,
    };
    let snapshot = tracker
        .start_session(&owner, &request.workout_type, start_time, utc_offset_hours)
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn list_sessions(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
) -> Result<Json<Vec<SessionSnapshot>>, ApiError> {
    Ok(Json(tracker.list_sessions(&owner).await?))
}

async fn get_session(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(tracker.get_session(&owner, &session_id).await?))
}

async fn add_points(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<PointsResponse>, ApiError> {
    let request: PointsRequest = decode_body(&body)?;
    let points_added = tracker
        .add_points(&owner, &session_id, &request.points)
        .await?;
    Ok(Json(PointsResponse { points_added }))
}

async fn pause_session(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let request: TransitionRequest = decode_body(&body)?;
    let at = request.at.unwrap_or_else(now_epoch_seconds);
    Ok(Json(tracker.pause_session(&owner, &session_id, at).await?))
}

async fn resume_session(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let request: TransitionRequest = decode_body(&body)?;
    let at = request.at.unwrap_or_else(now_epoch_seconds);
    Ok(Json(tracker.resume_session(&owner, &session_id, at).await?))
}

async fn finish_session(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let request: FinishRequest = decode_body(&body)?;
    let end_time = request.end_time.unwrap_or_else(now_epoch_seconds);
    let snapshot = tracker
        .finish_session(&owner, &session_id, end_time, request.weight_kg)
        .await?;
    Ok(Json(snapshot))
}

async fn get_trajectory(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<GpsPoint>>, ApiError> {
    Ok(Json(tracker.trajectory(&owner, &session_id).await?))
}

async fn get_route(
    State(tracker): State<WorkoutTracker>,
    Owner(owner): Owner,
    Path(session_id): Path<String>,
    query: Result<Query<RouteQuery>, QueryRejection>,
) -> Result<Json<Vec<GpsPoint>>, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    Ok(Json(tracker.route(&owner, &session_id, query.budget).await?))
}
