// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry: a bounded LRU map from session id to bound user.
//!
//! Sessions appear on first event-stream open and acquire a user binding
//! only after a successful OAuth callback. Lookups refresh recency; entries
//! idle past the TTL are dropped on access; when the registry is full the
//! least-recently-used entry is evicted silently. Losing a binding is
//! acceptable (the session falls back to the default worker) -- what is
//! never acceptable is unbounded growth.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Window within which a session counts as "recent" in [`SessionStats`].
const RECENT_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct SessionRecord {
    created_at: Instant,
    last_activity: Instant,
    user: Option<String>,
}

/// Aggregate counters exposed on the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// All tracked sessions.
    pub total_sessions: usize,
    /// Sessions with a user binding.
    pub authenticated_sessions: usize,
    /// Sessions active within the last five minutes.
    pub recent_sessions: usize,
}

/// Bounded LRU session registry with idle TTL.
pub struct SessionRegistry {
    inner: Mutex<HashMap<String, SessionRecord>>,
    capacity: usize,
    idle_ttl: Duration,
}

impl SessionRegistry {
    /// Creates a registry holding at most `capacity` sessions, expiring
    /// entries idle longer than `idle_ttl`.
    pub fn new(capacity: usize, idle_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            idle_ttl,
        }
    }

    /// Records a session sighting without changing its binding.
    ///
    /// Used by the event-stream endpoint so unauthenticated sessions show up
    /// in the health counters.
    pub fn touch(&self, session_id: &str) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let now = Instant::now();
        match inner.get_mut(session_id) {
            Some(record) => record.last_activity = now,
            None => {
                Self::make_room(&mut inner, self.capacity);
                inner.insert(
                    session_id.to_string(),
                    SessionRecord {
                        created_at: now,
                        last_activity: now,
                        user: None,
                    },
                );
            }
        }
    }

    /// Binds a session to a user (called only after a successful OAuth
    /// callback). Overwrites any previous binding.
    pub fn bind(&self, session_id: &str, user_id: &str) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let now = Instant::now();
        match inner.get_mut(session_id) {
            Some(record) => {
                record.user = Some(user_id.to_string());
                record.last_activity = now;
            }
            None => {
                Self::make_room(&mut inner, self.capacity);
                inner.insert(
                    session_id.to_string(),
                    SessionRecord {
                        created_at: now,
                        last_activity: now,
                        user: Some(user_id.to_string()),
                    },
                );
            }
        }
        debug!(session_id, user_id, "session bound");
    }

    /// Resolves a session to its bound user, refreshing LRU recency.
    ///
    /// Entries idle past the TTL are dropped and report as absent. A session
    /// known but unbound returns `None` as well -- callers route those to the
    /// default worker.
    pub fn user_of(&self, session_id: &str) -> Option<String> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let expired = match inner.get_mut(session_id) {
            Some(record) => {
                if record.last_activity.elapsed() > self.idle_ttl {
                    true
                } else {
                    record.last_activity = Instant::now();
                    return record.user.clone();
                }
            }
            None => return None,
        };
        if expired {
            inner.remove(session_id);
        }
        None
    }

    /// Removes a session outright.
    pub fn remove(&self, session_id: &str) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.remove(session_id);
    }

    /// Whether a session currently carries a user binding.
    pub fn is_authenticated(&self, session_id: &str) -> bool {
        self.user_of(session_id).is_some()
    }

    /// Aggregate counters for the health endpoint. Expired entries are
    /// pruned as a side effect.
    pub fn stats(&self) -> SessionStats {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.retain(|_, record| record.last_activity.elapsed() <= self.idle_ttl);

        let total_sessions = inner.len();
        let authenticated_sessions = inner.values().filter(|r| r.user.is_some()).count();
        let recent_sessions = inner
            .values()
            .filter(|r| r.last_activity.elapsed() <= RECENT_WINDOW)
            .count();

        SessionStats {
            total_sessions,
            authenticated_sessions,
            recent_sessions,
        }
    }

    /// Evicts the least-recently-used entry when the table is full.
    fn make_room(inner: &mut HashMap<String, SessionRecord>, capacity: usize) {
        if inner.len() < capacity {
            return;
        }
        if let Some(oldest) = inner
            .iter()
            .min_by_key(|(_, record)| record.last_activity)
            .map(|(id, _)| id.clone())
        {
            inner.remove(&oldest);
            debug!(session_id = oldest.as_str(), "session evicted (registry full)");
        }
    }
}
