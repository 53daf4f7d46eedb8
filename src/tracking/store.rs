use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::tracking::types::{GpsPoint, WorkoutSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {session_id} is not stored for owner {owner_id}")]
    MissingSession { owner_id: String, session_id: String },
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence collaborator. Every call is atomic for a single
/// `(owner_id, session_id)` pair.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<Option<WorkoutSession>, StoreError>;

    async fn save_session(&self, session: &WorkoutSession) -> Result<(), StoreError>;

    /// Append a batch and bump the stored session's `point_count` in the same
    /// write. Returns the new total.
    async fn append_points(
        &self,
        owner_id: &str,
        session_id: &str,
        points: &[GpsPoint],
    ) -> Result<usize, StoreError>;

    /// Points in arrival order.
    async fn load_all_points(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<Vec<GpsPoint>, StoreError>;

    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<WorkoutSession>, StoreError>;
}

/// Run a store call with an upper bound on its latency.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

type SessionKey = (String, String);

#[derive(Debug, Default)]
struct StoredSession {
    record: Option<WorkoutSession>,
    points: Vec<GpsPoint>,
}

/// Process-local store, used by the binary and by tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<SessionKey, StoredSession>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(owner_id: &str, session_id: &str) -> SessionKey {
    (owner_id.to_string(), session_id.to_string())
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn load_session(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<Option<WorkoutSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&key(owner_id, session_id))
            .and_then(|stored| stored.record.clone()))
    }

    async fn save_session(&self, session: &WorkoutSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .entry(key(&session.owner_id, &session.id))
            .or_default();
        stored.record = Some(session.clone());
        Ok(())
    }

    async fn append_points(
        &self,
        owner_id: &str,
        session_id: &str,
        points: &[GpsPoint],
    ) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().await;
        let missing = || StoreError::MissingSession {
            owner_id: owner_id.to_string(),
            session_id: session_id.to_string(),
        };
        let stored = sessions
            .get_mut(&key(owner_id, session_id))
            .ok_or_else(missing)?;
        let record = stored.record.as_mut().ok_or_else(missing)?;

        stored.points.extend_from_slice(points);
        record.point_count = stored.points.len();
        Ok(record.point_count)
    }

    async fn load_all_points(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<Vec<GpsPoint>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&key(owner_id, session_id))
            .map(|stored| stored.points.clone())
            .unwrap_or_default())
    }

    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<WorkoutSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .iter()
            .filter(|((owner, _), _)| owner == owner_id)
            .filter_map(|(_, stored)| stored.record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::types::SessionStatus;

    fn session(owner: &str, id: &str) -> WorkoutSession {
        WorkoutSession {
            id: id.to_string(),
            owner_id: owner.to_string(),
            workout_type: "run".to_string(),
            status: SessionStatus::Active,
            start_time: 0.0,
            end_time: None,
            point_count: 0,
            paused_at: None,
            pauses: Vec::new(),
            metrics: None,
            utc_offset_hours: None,
        }
    }

    #[tokio::test]
    async fn append_updates_stored_count() {
        let store = InMemoryStore::new();
        store.save_session(&session("alice", "s1")).await.unwrap();

        let points = vec![GpsPoint::new(0.0, 0.0, 1.0), GpsPoint::new(0.0, 0.0, 2.0)];
        assert_eq!(store.append_points("alice", "s1", &points).await.unwrap(), 2);
        assert_eq!(store.append_points("alice", "s1", &points).await.unwrap(), 4);

        let loaded = store.load_session("alice", "s1").await.unwrap().unwrap();
        assert_eq!(loaded.point_count, 4);
        assert_eq!(store.load_all_points("alice", "s1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn sessions_are_scoped_by_owner() {
        let store = InMemoryStore::new();
        store.save_session(&session("alice", "s1")).await.unwrap();

        assert!(store.load_session("bob", "s1").await.unwrap().is_none());
        assert!(store.list_sessions("bob").await.unwrap().is_empty());
        assert!(matches!(
            store.append_points("bob", "s1", &[]).await,
            Err(StoreError::MissingSession { .. })
        ));
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let result: Result<(), StoreError> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
