//! Server-side login sessions, each guarded by an inactivity timer.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use products_overtime::InactivityTimer;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

struct Session {
    user_id: Uuid,
    activity: mpsc::UnboundedSender<()>,
    _timer: InactivityTimer,
}

/// Live sessions keyed by session id. Cloning shares the same registry.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Register a new session and start its idle countdown. Must be called
    /// from within a tokio runtime.
    pub fn open(&self, user_id: Uuid) -> Uuid {
        let session_id = Uuid::new_v4();
        let (activity, signals) = mpsc::unbounded_channel();
        let sessions = Arc::downgrade(&self.sessions);
        let timer = InactivityTimer::arm(self.idle_timeout, signals, move || {
            let Some(sessions) = sessions.upgrade() else {
                return;
            };
            let expired = sessions.lock().remove(&session_id);
            if let Some(session) = expired {
                info!(%session_id, user_id = %session.user_id, "session expired after inactivity");
            }
        });
        self.sessions.lock().insert(
            session_id,
            Session {
                user_id,
                activity,
                _timer: timer,
            },
        );
        session_id
    }

    /// Record activity on a session. Returns `false` when the session is
    /// unknown, already ended or expired.
    pub fn touch(&self, session_id: Uuid) -> bool {
        let sessions = self.sessions.lock();
        match sessions.get(&session_id) {
            Some(session) => session.activity.send(()).is_ok(),
            None => false,
        }
    }

    pub fn is_active(&self, session_id: Uuid) -> bool {
        self.sessions.lock().contains_key(&session_id)
    }

    pub fn end(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.lock().remove(&session_id);
        removed.is_some()
    }

    /// End every session belonging to `user_id`, e.g. after the account is deleted.
    pub fn end_all_for(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_expires() {
        let registry = SessionRegistry::new(Duration::from_secs(15 * 60));
        let sid = registry.open(Uuid::new_v4());
        assert!(registry.is_active(sid));

        tokio::time::sleep(Duration::from_secs(15 * 60 + 1)).await;
        settle().await;
        assert!(!registry.is_active(sid));
        assert!(!registry.touch(sid));
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_session_alive() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let sid = registry.open(Uuid::new_v4());
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_secs(50)).await;
            assert!(registry.touch(sid));
            settle().await;
        }
        assert!(registry.is_active(sid));
    }

    #[tokio::test(start_paused = true)]
    async fn ending_sessions() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        let first = registry.open(user);
        let _second = registry.open(user);
        let other = registry.open(Uuid::new_v4());
        assert!(registry.end(first));
        assert!(!registry.end(first));
        assert_eq!(registry.end_all_for(user), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_active(other));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn clones_share_sessions_across_tasks() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.open(user) })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        assert_eq!(registry.len(), 8);
        assert!(ids.iter().all(|id| registry.touch(*id)));
        assert_eq!(registry.end_all_for(user), 8);
        assert!(registry.is_empty());
    }
}
