//! Continuous-mode session tracking.
//!
//! A `start` command opens an open-ended streaming session for a sensor;
//! only `stop` closes it. Sessions live in memory only: sensors are the
//! authority on their own streaming state, and the dashboard issues
//! best-effort requests, so losing this table on restart is acceptable.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// An open continuous-emission session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Spacing between readings, in seconds.
    pub interval: f64,
    /// When the session was opened (unix millis).
    pub started_at: i64,
}

impl Session {
    fn new(interval: f64) -> Self {
        Self {
            interval,
            started_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Default)]
struct Inner {
    /// Sessions opened per sensor id.
    sessions: HashMap<String, Session>,
    /// Session opened via broadcast start, covering every sensor.
    broadcast: Option<Session>,
}

/// Single owner of all session state.
///
/// Shared between the dispatcher (open/close on start/stop) and the ingest
/// path (state labelling of incoming readings). All read-modify-write goes
/// through the lock held by this tracker.
#[derive(Default)]
pub struct SessionTracker {
    inner: RwLock<Inner>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for one sensor.
    pub async fn open(&self, sensor_id: &str, interval: f64) {
        let mut inner = self.inner.write().await;
        inner
            .sessions
            .insert(sensor_id.to_string(), Session::new(interval));
    }

    /// Open a broadcast session covering all sensors. Per-sensor entries
    /// are cleared; the broadcast session supersedes them.
    pub async fn open_broadcast(&self, interval: f64) {
        let mut inner = self.inner.write().await;
        inner.sessions.clear();
        inner.broadcast = Some(Session::new(interval));
    }

    /// Close the session for one sensor. Returns whether one was open.
    /// Closing a sensor with no session is a no-op.
    pub async fn close(&self, sensor_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(sensor_id).is_some()
    }

    /// Close every session, including the broadcast one. A broadcast stop
    /// clears sessions regardless of how they were started.
    pub async fn close_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let count = inner.sessions.len() + usize::from(inner.broadcast.is_some());
        inner.sessions.clear();
        inner.broadcast = None;
        count
    }

    /// Whether the given sensor is expected to be streaming.
    pub async fn is_streaming(&self, sensor_id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.broadcast.is_some() || inner.sessions.contains_key(sensor_id)
    }

    /// Number of per-sensor sessions currently open.
    pub async fn active_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Whether a broadcast session is open.
    pub async fn broadcast_active(&self) -> bool {
        self.inner.read().await.broadcast.is_some()
    }
}
