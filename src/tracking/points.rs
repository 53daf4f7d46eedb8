use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::tracking::clock::to_utc;
use crate::tracking::store::{SessionStore, bounded};
use crate::tracking::types::{
    GpsPoint, SessionStatus, Simplification, TrackingError, WorkoutSession,
};

/// Ingests GPS batches for a session and hands back the full ordered track.
///
/// Callers hold the session's lock around [`PointBuffer::append`], which keeps
/// the stored count in step with the stored points.
#[derive(Clone)]
pub struct PointBuffer {
    store: Arc<dyn SessionStore>,
    store_timeout: Duration,
}

impl PointBuffer {
    pub fn new(store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Append a batch to `session`, updating its `point_count`.
    ///
    /// Ingestion is allowed while paused; only finished sessions refuse points.
    /// An empty batch succeeds without touching the store.
    pub async fn append(
        &self,
        session: &mut WorkoutSession,
        points: &[GpsPoint],
    ) -> Result<usize, TrackingError> {
        if session.status == SessionStatus::Finished {
            return Err(TrackingError::InvalidState {
                session_id: session.id.clone(),
                status: session.status,
                operation: "add points to",
            });
        }
        if points.is_empty() {
            return Ok(0);
        }
        validate_points(points)?;

        let total = bounded(
            self.store_timeout,
            self.store
                .append_points(&session.owner_id, &session.id, points),
        )
        .await?;
        session.point_count = total;

        debug!(
            session_id = %session.id,
            added = points.len(),
            total,
            "appended gps points"
        );
        Ok(points.len())
    }

    /// Every stored point for the session, ascending by timestamp.
    pub async fn all_points(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<Vec<GpsPoint>, TrackingError> {
        let mut points = bounded(
            self.store_timeout,
            self.store.load_all_points(owner_id, session_id),
        )
        .await?;
        sort_by_time(&mut points);
        Ok(points)
    }
}

/// Stable ascending sort, so samples sharing a timestamp keep arrival order.
pub fn sort_by_time(points: &mut [GpsPoint]) {
    points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
}

pub fn validate_points(points: &[GpsPoint]) -> Result<(), TrackingError> {
    for (idx, point) in points.iter().enumerate() {
        validate_point(point).map_err(|reason| {
            TrackingError::validation(format!("points[{idx}]"), reason)
        })?;
    }
    Ok(())
}

fn validate_point(point: &GpsPoint) -> Result<(), String> {
    if point.timestamp < 0.0 || to_utc(point.timestamp).is_none() {
        return Err(format!(
            "timestamp {} is not a representable non-negative epoch timestamp",
            point.timestamp
        ));
    }
    if !(-90.0..=90.0).contains(&point.latitude) {
        return Err(format!("latitude {} is outside [-90, 90]", point.latitude));
    }
    if !(-180.0..=180.0).contains(&point.longitude) {
        return Err(format!("longitude {} is outside [-180, 180]", point.longitude));
    }
    let optional = [
        ("altitude", point.altitude),
        ("accuracy", point.accuracy),
        ("speed", point.speed),
        ("heading", point.heading),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            if !value.is_finite() {
                return Err(format!("{name} must be finite"));
            }
        }
    }
    Ok(())
}

/// Thin an ordered trajectory for display. First and last points are always kept.
///
/// Only the route view uses this; metrics always see the full set.
pub fn simplify(points: &[GpsPoint], mode: Simplification) -> Result<Vec<GpsPoint>, TrackingError> {
    let stride = match mode {
        Simplification::Stride(0) => {
            return Err(TrackingError::validation("stride", "must be at least 1"));
        }
        Simplification::Stride(stride) => stride,
        Simplification::Budget(budget) if budget < 2 => {
            return Err(TrackingError::validation(
                "budget",
                "must be at least 2 to keep both endpoints",
            ));
        }
        Simplification::Budget(budget) if points.len() <= budget => return Ok(points.to_vec()),
        // One slot is reserved for the last point.
        Simplification::Budget(budget) => (points.len() - 1).div_ceil(budget - 1),
    };

    let Some(last_idx) = points.len().checked_sub(1) else {
        return Ok(Vec::new());
    };

    let mut kept: Vec<GpsPoint> = points[..last_idx]
        .iter()
        .step_by(stride)
        .cloned()
        .collect();
    kept.push(points[last_idx].clone());
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(len: usize) -> Vec<GpsPoint> {
        (0..len)
            .map(|idx| GpsPoint::new(0.0, idx as f64 * 0.001, idx as f64))
            .collect()
    }

    #[test]
    fn sort_is_stable_for_equal_timestamps() {
        let mut points = vec![
            GpsPoint::new(1.0, 0.0, 5.0),
            GpsPoint::new(2.0, 0.0, 1.0),
            GpsPoint::new(3.0, 0.0, 5.0),
            GpsPoint::new(4.0, 0.0, 1.0),
        ];
        sort_by_time(&mut points);
        let order: Vec<f64> = points.iter().map(|p| p.latitude).collect();
        assert_eq!(order, vec![2.0, 4.0, 1.0, 3.0]);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let err = validate_points(&[GpsPoint::new(0.0, 0.0, 1.0), GpsPoint::new(91.0, 0.0, 2.0)])
            .unwrap_err();
        assert!(matches!(err, TrackingError::Validation { ref field, .. } if field == "points[1]"));
    }

    #[test]
    fn rejects_unrepresentable_timestamps() {
        assert!(validate_points(&[GpsPoint::new(0.0, 0.0, -1.0)]).is_err());
        assert!(validate_points(&[GpsPoint::new(0.0, 0.0, f64::NAN)]).is_err());
        assert!(validate_points(&[GpsPoint::new(0.0, 0.0, 1.0e13)]).is_err());
    }

    #[test]
    fn stride_keeps_endpoints() {
        let points = track(10);
        let kept = simplify(&points, Simplification::Stride(4)).unwrap();
        let stamps: Vec<f64> = kept.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 4.0, 8.0, 9.0]);
    }

    #[test]
    fn budget_is_never_exceeded() {
        let points = track(1001);
        for budget in [2, 3, 7, 50, 500, 1000] {
            let kept = simplify(&points, Simplification::Budget(budget)).unwrap();
            assert!(kept.len() <= budget, "budget {budget} gave {}", kept.len());
            assert_eq!(kept.first(), points.first());
            assert_eq!(kept.last(), points.last());
        }
    }

    #[test]
    fn small_tracks_pass_through() {
        let points = track(5);
        assert_eq!(simplify(&points, Simplification::Budget(10)).unwrap(), points);
        assert!(simplify(&[], Simplification::Stride(3)).unwrap().is_empty());
        assert_eq!(simplify(&track(1), Simplification::Stride(3)).unwrap().len(), 1);
    }

    #[test]
    fn degenerate_parameters_are_rejected() {
        let points = track(5);
        assert!(simplify(&points, Simplification::Stride(0)).is_err());
        assert!(simplify(&points, Simplification::Budget(1)).is_err());
    }
}
