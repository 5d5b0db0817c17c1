//! Per-user job orchestration.
//!
//! The orchestrator owns the session store and the live-job registry,
//! starts and stops the recurring workers, and answers status queries. All
//! public operations are safe to call concurrently: the registry lock makes
//! the start path's check-and-insert atomic, so a racing start for the same
//! (user, kind) pair can never produce a second worker.

pub mod registry;

use crate::api::TeaBankClient;
use crate::config::{BotConfig, JobTimings};
use crate::error::{FarmError, Result};
use crate::session::{Session, SessionStore};
use crate::workers::{self, WorkerContext};
use registry::{JobKind, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Point-in-time liveness of one job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
}

/// Per-kind liveness snapshot for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStatus {
    pub mining: JobState,
    pub tasks: JobState,
    pub ads: JobState,
}

impl UserStatus {
    /// Liveness of a single kind.
    #[must_use]
    pub fn get(&self, kind: JobKind) -> JobState {
        match kind {
            JobKind::Mining => self.mining,
            JobKind::Tasks => self.tasks,
            JobKind::Ads => self.ads,
        }
    }
}

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh worker was spawned.
    Started,
    /// A worker was already live for this (user, kind); nothing was done.
    AlreadyRunning,
}

/// Coordinates bootstrap, workers, and status for all users.
pub struct Orchestrator {
    client: TeaBankClient,
    sessions: SessionStore,
    registry: Arc<Registry>,
    timings: JobTimings,
    tracker: TaskTracker,
}

impl Orchestrator {
    /// Create an orchestrator with an explicit client and timings.
    #[must_use]
    pub fn new(client: TeaBankClient, timings: JobTimings) -> Self {
        Self {
            client,
            sessions: SessionStore::new(),
            registry: Arc::new(Registry::new()),
            timings,
            tracker: TaskTracker::new(),
        }
    }

    /// Create an orchestrator from daemon configuration.
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        let client = TeaBankClient::new(config.api.clone())?;
        Ok(Self::new(client, config.timings.clone()))
    }

    /// Establish (or overwrite) a user's session from a webapp deep link.
    ///
    /// Runs payload extraction and token acquisition; errors are terminal
    /// for this attempt and surfaced to the caller.
    pub async fn bootstrap(&self, user_id: i64, link: &str) -> Result<Session> {
        let init_payload = crate::api::extract_init_payload(link)?;
        let auth_token = self.client.acquire_token(&init_payload).await?;

        let session = Session::new(user_id, init_payload, auth_token);
        self.sessions.put(session.clone());
        info!(user = user_id, "session established");
        Ok(session)
    }

    /// Start the worker for a job kind.
    ///
    /// Requires a bootstrapped session. Idempotent: a live worker for the
    /// same (user, kind) makes this a no-op rather than a second spawn.
    pub fn start(&self, user_id: i64, kind: JobKind) -> Result<StartOutcome> {
        let session = self
            .sessions
            .get(user_id)
            .ok_or(FarmError::NoSession(user_id))?;

        let Some(handle) = self.registry.try_insert((user_id, kind)) else {
            return Ok(StartOutcome::AlreadyRunning);
        };

        let ctx = WorkerContext {
            user_id,
            init_payload: session.init_payload,
            auth_token: session.auth_token,
            client: self.client.clone(),
            registry: Arc::clone(&self.registry),
            timings: self.timings.clone(),
            handle,
        };
        workers::spawn(kind, ctx, &self.tracker);
        info!(user = user_id, kind = %kind, "job started");
        Ok(StartOutcome::Started)
    }

    /// Start the unbounded jobs (mining and tasks) together.
    ///
    /// Ads is deliberately excluded: it is bounded and pauses the task
    /// sweeps while it runs, so it stays an explicit request.
    pub fn start_all(&self, user_id: i64) -> Result<()> {
        self.start(user_id, JobKind::Mining)?;
        self.start(user_id, JobKind::Tasks)?;
        Ok(())
    }

    /// Request cancellation of one job. No-op when nothing is running.
    ///
    /// The worker observes the signal within its wait granularity and
    /// removes its own registry entry on exit. Returns whether a live
    /// worker was signalled.
    pub fn stop(&self, user_id: i64, kind: JobKind) -> bool {
        let signalled = self.registry.cancel((user_id, kind));
        if signalled {
            info!(user = user_id, kind = %kind, "job stop requested");
        }
        signalled
    }

    /// Request cancellation of every job kind for a user.
    pub fn stop_all(&self, user_id: i64) {
        for kind in JobKind::ALL {
            self.stop(user_id, kind);
        }
    }

    /// Point-in-time liveness snapshot for a user.
    ///
    /// Reads only the registry; never blocks on worker internals.
    #[must_use]
    pub fn status(&self, user_id: i64) -> UserStatus {
        let state = |kind| {
            if self.registry.is_live((user_id, kind)) {
                JobState::Running
            } else {
                JobState::Stopped
            }
        };
        UserStatus {
            mining: state(JobKind::Mining),
            tasks: state(JobKind::Tasks),
            ads: state(JobKind::Ads),
        }
    }

    /// Whether the user has completed bootstrap.
    #[must_use]
    pub fn has_session(&self, user_id: i64) -> bool {
        self.sessions.contains(user_id)
    }

    /// Process-wide graceful shutdown.
    ///
    /// Requests cancellation for every live handle, then waits up to the
    /// grace period for workers to observe it, so no in-flight request is
    /// abandoned mid-write. Returns whether every worker exited in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.registry.cancel_all();
        self.tracker.close();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("all workers stopped");
                true
            }
            Err(_) => {
                tracing::warn!(
                    live = self.registry.live_count(),
                    "shutdown grace period elapsed with workers still running"
                );
                false
            }
        }
    }
}
