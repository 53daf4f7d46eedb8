use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::tracking::clock::time_info;
use crate::tracking::locks::SessionLocks;
use crate::tracking::points::{PointBuffer, simplify};
use crate::tracking::session;
use crate::tracking::store::{SessionStore, bounded};
use crate::tracking::summarize_session;
use crate::tracking::types::{
    GpsPoint, SessionSnapshot, SessionStatus, Simplification, TrackingError, WorkoutSession,
};

/// Tunables for [`WorkoutTracker`].
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Used when a finish request does not carry a body weight.
    pub default_weight_kg: f64,
    /// Point budget for route views when the caller gives none.
    pub route_budget: usize,
    /// How far a resume may precede its pause before it is rejected.
    /// `None` clamps every skew.
    pub clock_skew_tolerance_secs: Option<f64>,
    pub store_timeout: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            default_weight_kg: 70.0,
            route_budget: 500,
            clock_skew_tolerance_secs: None,
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Operation surface for workout sessions.
///
/// Writers to one session are serialized through [`SessionLocks`]; different
/// sessions never contend. Store failures are propagated, never retried.
#[derive(Clone)]
pub struct WorkoutTracker {
    store: Arc<dyn SessionStore>,
    buffer: PointBuffer,
    locks: Arc<SessionLocks>,
    settings: TrackerSettings,
}

impl WorkoutTracker {
    pub fn new(store: Arc<dyn SessionStore>, settings: TrackerSettings) -> Self {
        Self {
            buffer: PointBuffer::new(Arc::clone(&store), settings.store_timeout),
            store,
            locks: Arc::new(SessionLocks::new()),
            settings,
        }
    }

    /// `utc_offset_hours` selects the zone the session's times are shown in.
    pub async fn start_session(
        &self,
        owner_id: &str,
        workout_type: &str,
        start_time: f64,
        utc_offset_hours: Option<f64>,
    ) -> Result<SessionSnapshot, TrackingError> {
        let record = session::start(
            Uuid::new_v4().to_string(),
            owner_id.to_string(),
            workout_type.to_string(),
            start_time,
            utc_offset_hours,
        )?;
        self.save(&record).await?;

        info!(
            session_id = %record.id,
            owner_id,
            workout_type = %record.workout_type,
            "workout session started"
        );
        snapshot(&record)
    }

    pub async fn add_points(
        &self,
        owner_id: &str,
        session_id: &str,
        points: &[GpsPoint],
    ) -> Result<usize, TrackingError> {
        let _guard = self.locks.acquire(owner_id, session_id).await;
        let mut record = self.load(owner_id, session_id).await?;
        self.buffer.append(&mut record, points).await
    }

    pub async fn pause_session(
        &self,
        owner_id: &str,
        session_id: &str,
        at: f64,
    ) -> Result<SessionSnapshot, TrackingError> {
        let _guard = self.locks.acquire(owner_id, session_id).await;
        let mut record = self.load(owner_id, session_id).await?;
        session::pause(&mut record, at)?;
        self.save(&record).await?;

        info!(session_id, at, "workout session paused");
        snapshot(&record)
    }

    pub async fn resume_session(
        &self,
        owner_id: &str,
        session_id: &str,
        at: f64,
    ) -> Result<SessionSnapshot, TrackingError> {
        let _guard = self.locks.acquire(owner_id, session_id).await;
        let mut record = self.load(owner_id, session_id).await?;
        session::resume(&mut record, at, self.settings.clock_skew_tolerance_secs)?;
        self.save(&record).await?;

        info!(
            session_id,
            at,
            paused_seconds = record.total_paused_seconds(),
            "workout session resumed"
        );
        snapshot(&record)
    }

    /// Finish the session and store its metrics. Either the finished record is
    /// saved or the stored session stays as it was.
    pub async fn finish_session(
        &self,
        owner_id: &str,
        session_id: &str,
        end_time: f64,
        weight_kg: Option<f64>,
    ) -> Result<SessionSnapshot, TrackingError> {
        let _guard = self.locks.acquire(owner_id, session_id).await;
        let mut record = self.load(owner_id, session_id).await?;
        if record.status == SessionStatus::Finished {
            return Err(TrackingError::InvalidState {
                session_id: record.id,
                status: record.status,
                operation: "finish",
            });
        }

        let points = self.buffer.all_points(owner_id, session_id).await?;
        let weight_kg = weight_kg.unwrap_or(self.settings.default_weight_kg);
        summarize_session(&mut record, points, end_time, weight_kg)?;
        self.save(&record).await?;

        if let Some(report) = &record.metrics {
            info!(
                session_id,
                distance_m = report.distance.meters,
                duration_s = report.duration.seconds,
                calories = report.calories.burned,
                "workout session finished"
            );
        }
        snapshot(&record)
    }

    pub async fn get_session(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<SessionSnapshot, TrackingError> {
        let record = self.load(owner_id, session_id).await?;
        snapshot(&record)
    }

    /// Newest first.
    pub async fn list_sessions(&self, owner_id: &str) -> Result<Vec<SessionSnapshot>, TrackingError> {
        let mut records = bounded(self.settings.store_timeout, self.store.list_sessions(owner_id)).await?;
        records.sort_by(|a, b| {
            b.start_time
                .total_cmp(&a.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        debug!(owner_id, count = records.len(), "listed workout sessions");
        records.iter().map(snapshot).collect()
    }

    /// Full track, ascending by timestamp.
    pub async fn trajectory(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<Vec<GpsPoint>, TrackingError> {
        self.load(owner_id, session_id).await?;
        self.buffer.all_points(owner_id, session_id).await
    }

    /// Track thinned to at most `budget` points (configured default if `None`).
    pub async fn route(
        &self,
        owner_id: &str,
        session_id: &str,
        budget: Option<usize>,
    ) -> Result<Vec<GpsPoint>, TrackingError> {
        let budget = budget.unwrap_or(self.settings.route_budget);
        let points = self.trajectory(owner_id, session_id).await?;
        let route = simplify(&points, Simplification::Budget(budget))?;
        debug!(session_id, total = points.len(), kept = route.len(), "simplified route");
        Ok(route)
    }

    async fn load(&self, owner_id: &str, session_id: &str) -> Result<WorkoutSession, TrackingError> {
        bounded(
            self.settings.store_timeout,
            self.store.load_session(owner_id, session_id),
        )
        .await?
        .ok_or_else(|| TrackingError::SessionNotFound {
            session_id: session_id.to_string(),
        })
    }

    async fn save(&self, record: &WorkoutSession) -> Result<(), TrackingError> {
        bounded(self.settings.store_timeout, self.store.save_session(record)).await?;
        Ok(())
    }
}

/// Read-side view of `record`. Fails only for a stored record whose times
/// cannot be rendered, which validation keeps from ever being written.
pub fn snapshot(record: &WorkoutSession) -> Result<SessionSnapshot, TrackingError> {
    let render = |timestamp: f64| {
        time_info(timestamp, record.utc_offset_hours).ok_or_else(|| {
            error!(session_id = %record.id, timestamp, "stored timestamp cannot be rendered");
            TrackingError::CorruptState {
                session_id: record.id.clone(),
                reason: format!("timestamp {timestamp} cannot be rendered"),
            }
        })
    };
    Ok(SessionSnapshot {
        id: record.id.clone(),
        owner_id: record.owner_id.clone(),
        workout_type: record.workout_type.clone(),
        status: record.status,
        start: render(record.start_time)?,
        end: record.end_time.map(render).transpose()?,
        point_count: record.point_count,
        paused_at: record.paused_at,
        pauses: record.pauses.clone(),
        paused_seconds: record.total_paused_seconds(),
        metrics: record.metrics.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::store::InMemoryStore;

    fn tracker() -> WorkoutTracker {
        WorkoutTracker::new(Arc::new(InMemoryStore::new()), TrackerSettings::default())
    }

    #[tokio::test]
    async fn lock_registry_is_empty_between_operations() {
        let tracker = tracker();
        for i in 0..1000 {
            let result = tracker.pause_session("mallory", &format!("bogus-{i}"), 10.0).await;
            assert!(matches!(result, Err(TrackingError::SessionNotFound { .. })));
        }
        assert!(tracker.locks.is_empty());

        let id = tracker.start_session("alice", "run", 0.0, None).await.unwrap().id;
        tracker.add_points("alice", &id, &[GpsPoint::new(0.0, 0.0, 1.0)]).await.unwrap();
        tracker.pause_session("alice", &id, 5.0).await.unwrap();
        tracker.resume_session("alice", &id, 6.0).await.unwrap();
        tracker.finish_session("alice", &id, 10.0, None).await.unwrap();
        assert!(tracker.finish_session("bob", &id, 11.0, None).await.is_err());
        assert!(tracker.locks.is_empty());
    }

    #[tokio::test]
    async fn corrupt_stored_timestamp_is_not_rendered() {
        let tracker = tracker();
        let id = tracker.start_session("alice", "run", 0.0, None).await.unwrap().id;
        let mut record = tracker.load("alice", &id).await.unwrap();
        record.start_time = 1.0e13;
        tracker.save(&record).await.unwrap();

        assert!(matches!(
            tracker.get_session("alice", &id).await,
            Err(TrackingError::CorruptState { .. })
        ));
    }
}
