//! Ads loop: bounded ad watching, self-terminating at the target count.

use crate::error::FarmError;
use crate::orchestrator::registry::JobKind;
use crate::workers::{WorkerContext, idle_wait};
use tracing::{error, info, warn};

/// Bounded ad-watch loop.
///
/// Counts successful calls only; rejected attempts are logged and retried
/// on the normal cadence. The worker exits on its own once the target is
/// reached — the one kind that terminates without an external stop — and
/// removes its own registry entry either way.
pub(crate) async fn run(ctx: WorkerContext) {
    let user = ctx.user_id;
    let target = ctx.timings.ads_target;
    info!(user, target, "ads worker started");

    let mut watched = 0u32;
    while watched < target && !ctx.handle.cancel.is_cancelled() {
        match ctx.client.watch_ad(&ctx.init_payload, &ctx.auth_token).await {
            Ok(()) => {
                watched += 1;
                info!(user, watched, target, "ad watched");
            }
            Err(e @ FarmError::RequestFailed(_)) => {
                warn!(user, error = %e, "ad watch rejected");
            }
            Err(e) => {
                error!(user, error = %e, "ad watch transport failure");
                // Counter is kept across the cooldown.
                if idle_wait(&ctx.handle.cancel, ctx.timings.error_cooldown).await {
                    break;
                }
                continue;
            }
        }

        if watched >= target {
            break;
        }
        if idle_wait(&ctx.handle.cancel, ctx.timings.ad_interval).await {
            break;
        }
    }

    ctx.registry.remove_if((user, JobKind::Ads), ctx.handle.id);
    info!(user, watched, target, "ads worker finished");
}
