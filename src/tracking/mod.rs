pub mod clock;
pub mod geo;
pub mod locks;
pub mod metrics;
pub mod points;
pub mod session;
pub mod store;
pub mod tracker;
pub mod types;

use geo::total_distance;
use metrics::{MetricsInput, compute};
use points::sort_by_time;

pub use store::{InMemoryStore, SessionStore, StoreError};
pub use tracker::{TrackerSettings, WorkoutTracker};
pub use types::{
    GpsPoint, MetricsReport, PauseInterval, SessionSnapshot, SessionStatus, Simplification,
    TrackingError, WorkoutSession,
};

/// Close out a session and derive its final report.
///
/// The function performs four stages:
/// 1. [`session::finish`] moves the record to `finished`, closing any pause
///    still open at `end_time`.
/// 2. [`points::sort_by_time`] orders the complete point set; batches may have
///    arrived out of order.
/// 3. [`geo::total_distance`] sums the haversine legs and
///    [`session::net_duration`] subtracts paused time from the elapsed time.
/// 4. [`metrics::compute`] turns distance, duration, type and weight into the
///    [`MetricsReport`] stored on the session.
///
/// On error the session is left exactly as it was passed in.
pub fn summarize_session(
    session: &mut WorkoutSession,
    mut points: Vec<GpsPoint>,
    end_time: f64,
    weight_kg: f64,
) -> Result<(), TrackingError> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(TrackingError::validation(
            "weight_kg",
            format!("{weight_kg} must be a positive number"),
        ));
    }

    let mut finished = session.clone();
    session::finish(&mut finished, end_time)?;

    sort_by_time(&mut points);
    let distance_m = total_distance(&points);
    let duration_s = session::net_duration(&finished, end_time);

    finished.metrics = Some(compute(&MetricsInput {
        distance_m,
        duration_s,
        workout_type: &finished.workout_type,
        weight_kg,
        points: &points,
    }));

    *session = finished;
    Ok(())
}
