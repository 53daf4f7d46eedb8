//! Lifecycle transitions for a workout session.
//!
//! ```text
//! active -> paused -> active -> ... -> finished
//! ```
//!
//! `finished` is terminal. Every function here mutates the record in place and
//! leaves it untouched when it returns an error, so callers can persist the
//! record only on success.

use tracing::{error, warn};

use crate::tracking::clock::{validate_offset, validate_timestamp};
use crate::tracking::types::{PauseInterval, SessionStatus, TrackingError, WorkoutSession};

/// Fresh session in the `active` state. `utc_offset_hours` only affects how
/// timestamps are displayed.
pub fn start(
    id: String,
    owner_id: String,
    workout_type: String,
    start_time: f64,
    utc_offset_hours: Option<f64>,
) -> Result<WorkoutSession, TrackingError> {
    let workout_type = workout_type.trim().to_string();
    if workout_type.is_empty() {
        return Err(TrackingError::validation("workout_type", "must not be empty"));
    }
    validate_timestamp("start_time", start_time)?;
    if let Some(hours) = utc_offset_hours {
        validate_offset("timezone_offset_hours", hours)?;
    }

    Ok(WorkoutSession {
        id,
        owner_id,
        workout_type,
        status: SessionStatus::Active,
        start_time,
        end_time: None,
        point_count: 0,
        paused_at: None,
        pauses: Vec::new(),
        metrics: None,
        utc_offset_hours,
    })
}

pub fn pause(session: &mut WorkoutSession, at: f64) -> Result<(), TrackingError> {
    require_status(session, SessionStatus::Active, "pause")?;
    validate_timestamp("at", at)?;

    session.status = SessionStatus::Paused;
    session.paused_at = Some(at);
    Ok(())
}

/// Close the pending pause at `at`.
///
/// A resume stamped before its pause is clock skew. With no tolerance it is
/// clamped to a zero-length pause; with `skew_tolerance` set, skew beyond the
/// tolerance is rejected.
pub fn resume(
    session: &mut WorkoutSession,
    at: f64,
    skew_tolerance: Option<f64>,
) -> Result<(), TrackingError> {
    require_status(session, SessionStatus::Paused, "resume")?;
    validate_timestamp("at", at)?;
    let paused_at = pending_pause(session)?;

    let end = reconcile_skew(&session.id, paused_at, at, skew_tolerance)?;
    session.pauses.push(PauseInterval {
        start: paused_at,
        end,
    });
    session.paused_at = None;
    session.status = SessionStatus::Active;
    Ok(())
}

/// Net moving time between `start_time` and `end_time`.
///
/// `elapsed - paused`, clamped to `[0, elapsed]`.
pub fn net_duration(session: &WorkoutSession, end_time: f64) -> f64 {
    let elapsed = (end_time - session.start_time).max(0.0);
    (elapsed - session.total_paused_seconds()).clamp(0.0, elapsed)
}

/// Move the session to `finished`. A pause still open at `end_time` is closed
/// there first. Metrics are attached by the caller.
pub fn finish(session: &mut WorkoutSession, end_time: f64) -> Result<(), TrackingError> {
    if session.status == SessionStatus::Finished {
        return Err(TrackingError::InvalidState {
            session_id: session.id.clone(),
            status: session.status,
            operation: "finish",
        });
    }
    validate_timestamp("end_time", end_time)?;
    if session.status == SessionStatus::Paused {
        let paused_at = pending_pause(session)?;
        if end_time < paused_at {
            warn!(
                session_id = %session.id,
                paused_at,
                end_time,
                "finish stamped before pending pause, clamping pause to zero"
            );
        }
        session.pauses.push(PauseInterval {
            start: paused_at,
            end: end_time.max(paused_at),
        });
        session.paused_at = None;
    }

    session.status = SessionStatus::Finished;
    session.end_time = Some(end_time);
    Ok(())
}

fn require_status(
    session: &WorkoutSession,
    expected: SessionStatus,
    operation: &'static str,
) -> Result<(), TrackingError> {
    if session.status == expected {
        Ok(())
    } else {
        Err(TrackingError::InvalidState {
            session_id: session.id.clone(),
            status: session.status,
            operation,
        })
    }
}

fn pending_pause(session: &WorkoutSession) -> Result<f64, TrackingError> {
    session.paused_at.ok_or_else(|| {
        error!(session_id = %session.id, "paused session has no pending pause start");
        TrackingError::CorruptState {
            session_id: session.id.clone(),
            reason: "paused without a pending pause start".to_string(),
        }
    })
}

fn reconcile_skew(
    session_id: &str,
    paused_at: f64,
    resumed_at: f64,
    tolerance: Option<f64>,
) -> Result<f64, TrackingError> {
    if resumed_at >= paused_at {
        return Ok(resumed_at);
    }
    let skew = paused_at - resumed_at;
    if let Some(tolerance) = tolerance {
        if skew > tolerance {
            return Err(TrackingError::validation(
                "at",
                format!("resume is {skew:.3}s before the pause started (tolerance {tolerance}s)"),
            ));
        }
    }
    warn!(session_id, skew, "resume stamped before pause, clamping pause to zero");
    Ok(paused_at)
}
