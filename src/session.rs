//! Per-user session storage.
//!
//! A session is created once per user by the bootstrap step and holds the
//! credentials every worker needs: the opaque init payload extracted from
//! the webapp deep link and the auth token acquired with it. Sessions live
//! for the process lifetime and are overwritten (not merged) when a user
//! re-sends a link.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Stored credentials for one user.
#[derive(Debug, Clone)]
pub struct Session {
    /// Telegram user identity.
    pub user_id: i64,
    /// Opaque init payload, passed verbatim to every API call.
    pub init_payload: String,
    /// Auth token acquired at bootstrap; assumed valid indefinitely.
    pub auth_token: String,
    /// When the session was established.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session stamped with the current time.
    #[must_use]
    pub fn new(user_id: i64, init_payload: String, auth_token: String) -> Self {
        Self {
            user_id,
            init_payload,
            auth_token,
            created_at: Utc::now(),
        }
    }
}

/// Synchronized map of user id to session.
///
/// Written only by bootstrap; read by the orchestrator when starting
/// workers. Workers capture their token/payload at start time, so an
/// overwrite while jobs are running is allowed (known staleness risk).
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<i64, Session>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the session for a user.
    pub fn put(&self, session: Session) {
        let mut sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session.user_id, session);
    }

    /// Snapshot the session for a user, if bootstrapped.
    #[must_use]
    pub fn get(&self, user_id: i64) -> Option<Session> {
        let sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(&user_id).cloned()
    }

    /// Whether the user has completed bootstrap.
    #[must_use]
    pub fn contains(&self, user_id: i64) -> bool {
        let sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions.contains_key(&user_id)
    }
}
