//! Tasks loop: sweep the task-id range, wait out the interval, repeat.
//!
//! Sweeping yields to a live ads job for the same user: the loop idles on a
//! short recheck interval instead of starting a sweep, and a running sweep
//! aborts as soon as an ads worker appears. The rule is directional — ads
//! never waits for tasks.

use crate::api::TASK_ID_RANGE;
use crate::error::FarmError;
use crate::orchestrator::registry::JobKind;
use crate::workers::{WorkerContext, idle_wait};
use tracing::{debug, error, info, warn};

/// How one pass over the task-id range ended.
enum SweepOutcome {
    /// Every task id was attempted.
    Completed { successes: u32 },
    /// An ads worker became live mid-sweep.
    AdsInterrupted { successes: u32 },
    /// Transport failure; caller applies the error cooldown.
    TransportFailed { successes: u32 },
    /// Cancellation observed.
    Cancelled,
}

/// Unbounded task-sweep loop.
pub(crate) async fn run(ctx: WorkerContext) {
    let user = ctx.user_id;
    info!(user, "tasks worker started");

    loop {
        if ctx.handle.cancel.is_cancelled() {
            break;
        }

        if ctx.registry.is_live((user, JobKind::Ads)) {
            debug!(user, "tasks paused while ads job is live");
            if idle_wait(&ctx.handle.cancel, ctx.timings.ads_block_recheck).await {
                break;
            }
            continue;
        }

        let wait = match sweep(&ctx).await {
            SweepOutcome::Cancelled => break,
            SweepOutcome::Completed { successes } => {
                if successes > 0 {
                    info!(user, successes, "task sweep completed");
                }
                ctx.timings.sweep_interval
            }
            SweepOutcome::AdsInterrupted { successes } => {
                info!(user, successes, "task sweep aborted for ads job");
                ctx.timings.sweep_interval
            }
            SweepOutcome::TransportFailed { successes } => {
                debug!(user, successes, "task sweep aborted on transport failure");
                ctx.timings.error_cooldown
            }
        };

        if idle_wait(&ctx.handle.cancel, wait).await {
            break;
        }
    }

    ctx.registry.remove_if((user, JobKind::Tasks), ctx.handle.id);
    info!(user, "tasks worker stopped");
}

/// One sequential pass over the task-id range with per-call pacing.
///
/// Per-call rejections (rate limit, non-200 status) are logged and the
/// sweep continues; only a transport failure aborts it.
async fn sweep(ctx: &WorkerContext) -> SweepOutcome {
    let user = ctx.user_id;
    let mut successes = 0u32;

    for task_id in TASK_ID_RANGE {
        if ctx.handle.cancel.is_cancelled() {
            return SweepOutcome::Cancelled;
        }
        if ctx.registry.is_live((user, JobKind::Ads)) {
            return SweepOutcome::AdsInterrupted { successes };
        }

        match ctx
            .client
            .complete_task(&ctx.init_payload, &ctx.auth_token, task_id)
            .await
        {
            Ok(()) => successes += 1,
            Err(FarmError::RateLimited) => {
                warn!(user, task_id, "task completion rate limited");
            }
            Err(FarmError::RequestFailed(status)) => {
                debug!(user, task_id, status, "task completion rejected");
            }
            Err(e) => {
                error!(user, task_id, error = %e, "task completion transport failure");
                return SweepOutcome::TransportFailed { successes };
            }
        }

        if idle_wait(&ctx.handle.cancel, ctx.timings.task_pause).await {
            return SweepOutcome::Cancelled;
        }
    }

    SweepOutcome::Completed { successes }
}
