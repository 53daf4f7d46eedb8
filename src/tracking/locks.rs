use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type SessionKey = (String, String);

/// One async mutex per `(owner, session)` so writers to the same session are
/// serialized while different sessions proceed independently.
///
/// Entries live only while someone holds or waits on them; the last
/// [`SessionGuard`] to drop removes its entry.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

/// Exclusive hold on one session, released on drop.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    registry: &'a SessionLocks,
    key: SessionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, owner_id: &str, session_id: &str) -> SessionGuard<'_> {
        let key = (owner_id.to_string(), session_id.to_string());
        // Clone the Arc out so the shard guard is dropped before awaiting.
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        SessionGuard {
            registry: self,
            key,
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop the entry unless another task still holds a clone of its mutex.
    /// `remove_if` runs under the shard lock, so no `acquire` can clone the
    /// Arc between the count check and the removal.
    fn release(&self, key: &SessionKey) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the owned guard's Arc clone no longer counts.
        drop(self.guard.take());
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_session_is_exclusive() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.acquire("alice", "s1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("alice", "s1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_sessions_do_not_block() {
        let locks = SessionLocks::new();
        let _first = locks.acquire("alice", "s1").await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire("alice", "s2")).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);

        drop(second);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.acquire("alice", "s1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("alice", "s1").await;
                locks.len()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);
        assert_eq!(waiter.await.unwrap(), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn registry_shrinks_after_each_release() {
        let locks = SessionLocks::new();
        for i in 0..100 {
            let _guard = locks.acquire("mallory", &format!("bogus-{i}")).await;
        }
        assert!(locks.is_empty());
    }
}
