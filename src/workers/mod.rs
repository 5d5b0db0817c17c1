//! Worker loops for the three job kinds.
//!
//! All three share the same shape: do a unit of work, then an interruptible
//! wait, then repeat. Cancellation is cooperative — checked before every
//! unit of work and raced against every wait — and a worker removes its own
//! registry entry on the way out.

pub(crate) mod ads;
pub(crate) mod mining;
pub(crate) mod tasks;

use crate::api::TeaBankClient;
use crate::config::JobTimings;
use crate::orchestrator::registry::{JobHandle, JobKind, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Everything a worker loop needs, captured at start time.
///
/// The token/payload are a snapshot of the user's session; a later
/// re-bootstrap does not reach into running workers.
pub(crate) struct WorkerContext {
    pub user_id: i64,
    pub init_payload: String,
    pub auth_token: String,
    pub client: TeaBankClient,
    pub registry: Arc<Registry>,
    pub timings: JobTimings,
    pub handle: JobHandle,
}

/// Spawn the loop for a job kind onto the orchestrator's task tracker.
pub(crate) fn spawn(kind: JobKind, ctx: WorkerContext, tracker: &TaskTracker) {
    match kind {
        JobKind::Mining => {
            tracker.spawn(mining::run(ctx));
        }
        JobKind::Tasks => {
            tracker.spawn(tasks::run(ctx));
        }
        JobKind::Ads => {
            tracker.spawn(ads::run(ctx));
        }
    }
}

/// Wait for the given duration unless cancellation arrives first.
///
/// Returns `true` when the wait was interrupted by cancellation.
pub(crate) async fn idle_wait(cancel: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => true,
        () = tokio::time::sleep(wait) => false,
    }
}
