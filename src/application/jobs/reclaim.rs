//! Cron job reverting `Precomputing` rows stranded by a crashed worker.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::*;
use cron::Schedule;

use crate::application::precompute::PrecomputeService;

/// Marker struct for the cron-triggered reclaim sweep.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct ReclaimStuckJob;

impl From<chrono::DateTime<chrono::Utc>> for ReclaimStuckJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Context for the reclaim sweep worker.
#[derive(Clone)]
pub struct ReclaimContext {
    pub precompute: Arc<PrecomputeService>,
}

/// Process the sweep: revert rows stuck in `Precomputing` past the timeout.
pub async fn process_reclaim_stuck_job(
    _job: ReclaimStuckJob,
    ctx: Data<ReclaimContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.precompute.reclaim_stuck().await {
        Ok(count) if count > 0 => {
            tracing::info!(reclaimed = count, "Reclaimed stranded precompute rows");
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to reclaim stranded precompute rows");
        }
        _ => {}
    }
    Ok(())
}

/// Create the cron schedule for the reclaim sweep.
/// Runs every five minutes: "0 */5 * * * *"
pub fn reclaim_schedule() -> Schedule {
    Schedule::from_str("0 */5 * * * *").expect("Invalid cron expression for reclaim_stuck")
}
