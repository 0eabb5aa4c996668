mod reclaim;

pub use reclaim::{
    ReclaimContext, ReclaimStuckJob, process_reclaim_stuck_job, reclaim_schedule,
};
