use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_LOOKUP_HIT: &str = "wavecache_lookup_hit_total";
pub const METRIC_LOOKUP_MISS: &str = "wavecache_lookup_miss_total";
pub const METRIC_UPDATE_TOTAL: &str = "wavecache_update_total";
pub const METRIC_UPDATE_REJECTED: &str = "wavecache_update_rejected_total";
pub const METRIC_INVALIDATED: &str = "wavecache_invalidated_total";
pub const METRIC_PRECOMPUTE_SUCCESS: &str = "wavecache_precompute_success_total";
pub const METRIC_PRECOMPUTE_FAILURE: &str = "wavecache_precompute_failure_total";
pub const METRIC_PRECOMPUTE_INFLIGHT: &str = "wavecache_precompute_inflight";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_LOOKUP_HIT,
            Unit::Count,
            "Total number of cache lookups served from a valid entry."
        );
        describe_counter!(
            METRIC_LOOKUP_MISS,
            Unit::Count,
            "Total number of cache lookups the caller had to recompute."
        );
        describe_counter!(
            METRIC_UPDATE_TOTAL,
            Unit::Count,
            "Total number of accepted cache updates."
        );
        describe_counter!(
            METRIC_UPDATE_REJECTED,
            Unit::Count,
            "Total number of updates rejected by the update switch."
        );
        describe_counter!(
            METRIC_INVALIDATED,
            Unit::Count,
            "Total number of entries transitioned to invalid."
        );
        describe_counter!(
            METRIC_PRECOMPUTE_SUCCESS,
            Unit::Count,
            "Total number of entries returned to valid by the scheduler."
        );
        describe_counter!(
            METRIC_PRECOMPUTE_FAILURE,
            Unit::Count,
            "Total number of failed precompute attempts."
        );
        describe_gauge!(
            METRIC_PRECOMPUTE_INFLIGHT,
            Unit::Count,
            "Entries currently claimed for recomputation."
        );
    });
}
