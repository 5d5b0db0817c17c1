//! Live-job registry.
//!
//! The registry is the only structure mutated by more than one concurrent
//! actor: the orchestrator (start/stop paths) and the workers themselves
//! (self-removal on exit). One mutex covers the whole map so the start
//! path's check-and-insert is atomic and two workers can never be live for
//! the same (user, kind) pair.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Category of recurring automated work. Not user-extensible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Farming cycles on a 3-hour cadence.
    Mining,
    /// Sweeps over the fixed task-id range.
    Tasks,
    /// Bounded ad watching (self-terminating).
    Ads,
}

impl JobKind {
    /// All kinds, in the order stop-all and status iterate them.
    pub const ALL: [JobKind; 3] = [JobKind::Mining, JobKind::Tasks, JobKind::Ads];
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Mining => write!(f, "mining"),
            JobKind::Tasks => write!(f, "tasks"),
            JobKind::Ads => write!(f, "ads"),
        }
    }
}

impl FromStr for JobKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mining" => Ok(JobKind::Mining),
            "tasks" => Ok(JobKind::Tasks),
            "ads" => Ok(JobKind::Ads),
            _ => Err(()),
        }
    }
}

/// Registry key: one slot per (user, kind).
pub type JobKey = (i64, JobKind);

/// Marker for one live worker: its cancellation signal plus a generation id.
///
/// The generation id makes removal idempotent across the stop/restart race:
/// a worker only ever removes the entry it was registered under, never a
/// successor's.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// Generation id, unique per spawned worker.
    pub id: u64,
    /// Cooperative cancellation signal, polled by the worker.
    pub cancel: CancellationToken,
}

/// Synchronized map of live job handles.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<HashMap<JobKey, JobHandle>>,
    next_id: AtomicU64,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically insert a fresh handle for the key.
    ///
    /// Returns `None` when a handle is already live (start is idempotent);
    /// otherwise the new handle the caller must hand to the worker.
    pub fn try_insert(&self, key: JobKey) -> Option<JobHandle> {
        let mut jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if jobs.contains_key(&key) {
            return None;
        }

        let handle = JobHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            cancel: CancellationToken::new(),
        };
        jobs.insert(key, handle.clone());
        Some(handle)
    }

    /// Whether a worker is currently live for the key.
    #[must_use]
    pub fn is_live(&self, key: JobKey) -> bool {
        let jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        jobs.contains_key(&key)
    }

    /// Request cancellation of the worker for the key, if one is live.
    ///
    /// The entry stays in the map until the worker observes the signal and
    /// removes itself. Returns whether a live handle was signalled.
    pub fn cancel(&self, key: JobKey) -> bool {
        let jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.get(&key) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the entry for the key if it still belongs to the given
    /// generation. Workers call this on exit; a stale worker leaves a
    /// successor's entry untouched.
    pub fn remove_if(&self, key: JobKey, id: u64) {
        let mut jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if jobs.get(&key).is_some_and(|handle| handle.id == id) {
            jobs.remove(&key);
        }
    }

    /// Request cancellation of every live handle (process shutdown).
    pub fn cancel_all(&self) {
        let jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for handle in jobs.values() {
            handle.cancel.cancel();
        }
    }

    /// Number of live handles (diagnostics).
    #[must_use]
    pub fn live_count(&self) -> usize {
        let jobs = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        jobs.len()
    }
}
