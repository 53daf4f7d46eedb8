use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracking::store::StoreError;

/// Single GPS sample as reported by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch seconds, fractional part allowed.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            altitude: None,
            accuracy: None,
            speed: None,
            heading: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }
}

/// A closed pause window. Open pauses live in [`WorkoutSession::paused_at`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseInterval {
    pub start: f64,
    pub end: f64,
}

impl PauseInterval {
    /// Length of the pause, never negative.
    pub fn duration_seconds(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical session record exchanged with the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub owner_id: String,
    pub workout_type: String,
    pub status: SessionStatus,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub point_count: usize,
    /// Start of the pause currently in progress.
    pub paused_at: Option<f64>,
    pub pauses: Vec<PauseInterval>,
    pub metrics: Option<MetricsReport>,
    /// Zone the owner's timestamps are displayed in; `None` means UTC.
    #[serde(default)]
    pub utc_offset_hours: Option<f64>,
}

impl WorkoutSession {
    pub fn total_paused_seconds(&self) -> f64 {
        self.pauses.iter().map(PauseInterval::duration_seconds).sum()
    }
}

/// Epoch timestamp rendered for display in the session's zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub timestamp: f64,
    /// RFC 3339 with the zone offset.
    pub iso: String,
    /// Wall-clock time without an offset.
    pub iso_local: String,
    pub date: String,
    pub time: String,
    pub timezone: String,
    pub timezone_offset: Option<f64>,
}

/// Read-side view of a session returned by every tracker operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub owner_id: String,
    pub workout_type: String,
    pub status: SessionStatus,
    pub start: TimeInfo,
    pub end: Option<TimeInfo>,
    pub point_count: usize,
    pub paused_at: Option<f64>,
    pub pauses: Vec<PauseInterval>,
    pub paused_seconds: f64,
    pub metrics: Option<MetricsReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceInfo {
    pub meters: f64,
    pub kilometers: f64,
    pub miles: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationInfo {
    pub seconds: f64,
    pub minutes: f64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaceInfo {
    pub min_per_km: f64,
    pub min_per_mile: f64,
    pub km_per_hour: f64,
    pub mph: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalorieInfo {
    pub burned: f64,
    pub estimated: bool,
    pub method: String,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub point_count: usize,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub elevation_profile: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    VeryHigh,
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityZones {
    pub warmup_s: u64,
    pub active_s: u64,
    pub cooldown_s: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityInfo {
    pub intensity: Intensity,
    pub effort_level: u8,
    pub zones: IntensityZones,
}

/// Final figures for a finished session. Computed once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub distance: DistanceInfo,
    pub duration: DurationInfo,
    pub pace: PaceInfo,
    pub calories: CalorieInfo,
    pub route: RouteSummary,
    pub intensity: IntensityInfo,
}

/// Ways of thinning a trajectory for route rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simplification {
    /// Keep every n-th point.
    Stride(usize),
    /// Keep at most n points.
    Budget(usize),
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("session {session_id} not found")]
    SessionNotFound { session_id: String },
    #[error("cannot {operation} session {session_id} while it is {status}")]
    InvalidState {
        session_id: String,
        status: SessionStatus,
        operation: &'static str,
    },
    #[error("session {session_id} is corrupt: {reason}")]
    CorruptState { session_id: String, reason: String },
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl TrackingError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TrackingError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            TrackingError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            TrackingError::InvalidState { .. } => "INVALID_STATE",
            TrackingError::CorruptState { .. } => "CORRUPT_STATE",
            TrackingError::Validation { .. } => "VALIDATION_ERROR",
            TrackingError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
