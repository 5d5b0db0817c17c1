//! Mining loop: start a farming cycle, wait out the interval, repeat.

use crate::orchestrator::registry::JobKind;
use crate::workers::{WorkerContext, idle_wait};
use tracing::{error, info};

/// Unbounded farming loop.
///
/// A successful call is followed by the full farm interval (3 hours in
/// production); a failed call by the short error cooldown, so a single
/// failure never halts the loop permanently.
pub(crate) async fn run(ctx: WorkerContext) {
    let user = ctx.user_id;
    info!(user, "mining worker started");

    loop {
        if ctx.handle.cancel.is_cancelled() {
            break;
        }

        let wait = match ctx.client.start_farming(&ctx.auth_token).await {
            Ok(()) => {
                info!(user, "farming cycle started");
                ctx.timings.farm_interval
            }
            Err(e) => {
                error!(user, error = %e, "farming call failed; retrying after cooldown");
                ctx.timings.error_cooldown
            }
        };

        if idle_wait(&ctx.handle.cancel, wait).await {
            break;
        }
    }

    ctx.registry.remove_if((user, JobKind::Mining), ctx.handle.id);
    info!(user, "mining worker stopped");
}
