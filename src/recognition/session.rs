//! # Recognition Sessions
//!
//! A `Session` is the complete per-connection state of the pipeline: the frame window
//! and the smoothing history. It is a plain value; the connection actor checks it out of
//! the `SessionRegistry`, runs one decision cycle on it, and puts it back.
//!
//! ## Session Lifecycle:
//! 1. **Created** lazily on the first frame from a connection
//! 2. **Updated** once per frame by that connection's actor
//! 3. **Evicted** when the connection closes, or by the idle sweep after the TTL
//!
//! An expired session is indistinguishable from one that never existed: the next frame
//! simply starts a fresh session.

use crate::recognition::buffer::{FrameBuffer, WindowConfig};
use crate::recognition::frame::Frame;
use crate::recognition::labels::LabelVocabulary;
use crate::recognition::smoother::{DecisionSmoother, SmoothingConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-connection pipeline state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub buffer: FrameBuffer,
    pub smoother: DecisionSmoother,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame to the window. `Some(absolute_frame)` when inference is due.
    pub fn ingest(&mut self, frame: Frame, config: &WindowConfig) -> Option<u64> {
        self.buffer.ingest(frame, config)
    }

    /// Apply a successful prediction made for `absolute_frame`.
    ///
    /// Only called once the inference call has returned a usable score vector, so a
    /// failed call leaves the pacing state exactly as it was.
    pub fn complete_prediction(
        &mut self,
        absolute_frame: u64,
        scores: &[f64],
        config: &SmoothingConfig,
    ) -> Option<usize> {
        self.buffer.mark_predicted(absolute_frame);
        self.smoother.decide(scores, config)
    }
}

/// Snapshot of a live session for the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub connection_id: String,
    pub buffered_frames: usize,
    pub absolute_frame: u64,
    pub last_predicted_frame: u64,
    pub last_emitted: Option<String>,
    /// Provisional labels of the most recent predictions, oldest first
    pub recent_predictions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub idle_seconds: f64,
}

struct SessionEntry {
    session: Session,
    created_at: DateTime<Utc>,
    last_touched: Instant,
}

impl SessionEntry {
    fn new(session: Session, now: Instant) -> Self {
        Self {
            session,
            created_at: Utc::now(),
            last_touched: now,
        }
    }

    fn summary(&self, connection_id: &str, labels: &LabelVocabulary, now: Instant) -> SessionSummary {
        SessionSummary {
            connection_id: connection_id.to_string(),
            buffered_frames: self.session.buffer.len(),
            absolute_frame: self.session.buffer.absolute_frame(),
            last_predicted_frame: self.session.buffer.last_predicted_frame(),
            last_emitted: self
                .session
                .smoother
                .last_emitted()
                .and_then(|index| labels.get(index))
                .map(str::to_string),
            recent_predictions: self
                .session
                .smoother
                .history()
                .filter_map(|&index| labels.get(index))
                .map(str::to_string)
                .collect(),
            created_at: self.created_at,
            idle_seconds: now.saturating_duration_since(self.last_touched).as_secs_f64(),
        }
    }
}

/// Keyed session store with idle expiry.
///
/// ## Thread Safety:
/// Connection actors and the background sweep share one `Arc<RwLock<HashMap>>`. Each
/// connection only ever touches its own key, and the lock is never held across an await,
/// so one slow inference call cannot block other connections.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Fetch the session for `connection_id`, creating an empty one if there is none
    /// (never seen, or already expired). Counts as a touch.
    pub fn get_or_create(&self, connection_id: &str) -> Session {
        let now = Instant::now();
        let mut sessions = self.write();

        let entry = sessions
            .entry(connection_id.to_string())
            .or_insert_with(|| {
                debug!(connection_id, "Creating recognition session");
                SessionEntry::new(Session::new(), now)
            });
        entry.last_touched = now;

        entry.session.clone()
    }

    /// Store the session for `connection_id`. Counts as a touch.
    pub fn put(&self, connection_id: &str, session: Session) {
        let now = Instant::now();
        let mut sessions = self.write();

        match sessions.get_mut(connection_id) {
            Some(entry) => {
                entry.session = session;
                entry.last_touched = now;
            }
            None => {
                sessions.insert(connection_id.to_string(), SessionEntry::new(session, now));
            }
        }
    }

    /// Remove the session for `connection_id`. Returns whether one existed.
    pub fn evict(&self, connection_id: &str) -> bool {
        self.write().remove(connection_id).is_some()
    }

    /// Remove every session idle for longer than the TTL.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.write();
        let before = sessions.len();

        sessions.retain(|connection_id, entry| {
            let keep = now.saturating_duration_since(entry.last_touched) <= ttl;
            if !keep {
                debug!(connection_id = %connection_id, "Session expired");
            }
            keep
        });

        before - sessions.len()
    }

    /// Sweep expired sessions every `period` until the runtime shuts down.
    pub async fn run_sweeper(self, period: Duration, on_expired: impl Fn(usize)) {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = self.sweep_expired();
            if removed > 0 {
                info!(removed, remaining = self.len(), "Expired idle sessions");
                on_expired(removed);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Summary of one session. Does not count as a touch.
    pub fn summary(&self, connection_id: &str, labels: &LabelVocabulary) -> Option<SessionSummary> {
        let now = Instant::now();
        self.read()
            .get(connection_id)
            .map(|entry| entry.summary(connection_id, labels, now))
    }

    /// Summaries of all sessions, ordered by connection id. Does not count as a touch.
    pub fn summaries(&self, labels: &LabelVocabulary) -> Vec<SessionSummary> {
        let now = Instant::now();
        let mut summaries: Vec<SessionSummary> = self
            .read()
            .iter()
            .map(|(connection_id, entry)| entry.summary(connection_id, labels, now))
            .collect();
        summaries.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
        summaries
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
