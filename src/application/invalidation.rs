//! Invalidation engine: transitions `Valid` rows to `Invalid` when an
//! external fact they depended on changes.
//!
//! Three modes, all gated by the persisted Invalidate switch: spatial
//! (rows near a changed location), ruleset (rows computed under a changed
//! ruleset), and full. Invalidation never deletes rows and never touches
//! the replayable request/response payloads.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};

use crate::{
    application::{
        gateways::RulesetDirectory,
        repos::{EntriesRepo, RepoError, SwitchesRepo},
    },
    domain::{geo::CoverageRegion, types::SwitchKind},
    infra::telemetry::METRIC_INVALIDATED,
};

/// Default great-circle radius applied to a changed region when neither the
/// region nor the ruleset directory supplies one. Conservative: wide enough
/// to cover the interference range of any supported device class.
pub const DEFAULT_SPATIAL_RADIUS_KM: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationOutcome {
    Invalidated(u64),
    Rejected,
}

/// Resolution order for a region's effective radius: explicit region value,
/// then the optional directory collaborator, then the configured default.
/// Directory failures degrade to the default rather than failing the call.
pub struct SpatialRadiusPolicy {
    directory: Option<Arc<dyn RulesetDirectory>>,
    default_radius_km: f64,
}

impl SpatialRadiusPolicy {
    pub fn new(directory: Option<Arc<dyn RulesetDirectory>>, default_radius_km: f64) -> Self {
        Self {
            directory,
            default_radius_km,
        }
    }

    pub async fn resolve(&self, region: &CoverageRegion) -> f64 {
        if let Some(radius) = region.radius_km {
            return radius;
        }
        if let Some(directory) = self.directory.as_ref() {
            match directory.invalidation_radius_km().await {
                Ok(Some(radius)) => return radius,
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        target = "wavecache::invalidation",
                        error = %error,
                        "ruleset directory unavailable, falling back to default radius"
                    );
                }
            }
        }
        self.default_radius_km
    }
}

pub struct InvalidationService {
    entries: Arc<dyn EntriesRepo>,
    switches: Arc<dyn SwitchesRepo>,
    radius_policy: SpatialRadiusPolicy,
}

impl InvalidationService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        switches: Arc<dyn SwitchesRepo>,
        radius_policy: SpatialRadiusPolicy,
    ) -> Self {
        Self {
            entries,
            switches,
            radius_policy,
        }
    }

    /// Invalidate `Valid` rows whose coordinates fall inside any changed
    /// region. Idempotent: re-running with the same regions is a no-op.
    pub async fn spatial(
        &self,
        regions: &[CoverageRegion],
    ) -> Result<InvalidationOutcome, RepoError> {
        if !self.enabled().await? {
            return Ok(InvalidationOutcome::Rejected);
        }

        let mut total = 0u64;
        for region in regions {
            let radius_km = self.radius_policy.resolve(region).await;
            total += self
                .entries
                .invalidate_within(region.center, radius_km)
                .await?;
        }

        self.record(total);
        info!(
            target = "wavecache::invalidation",
            regions = regions.len(),
            invalidated = total,
            "spatial invalidation"
        );
        Ok(InvalidationOutcome::Invalidated(total))
    }

    /// Invalidate `Valid` rows computed under the given ruleset.
    pub async fn ruleset(&self, ruleset_id: &str) -> Result<InvalidationOutcome, RepoError> {
        if !self.enabled().await? {
            return Ok(InvalidationOutcome::Rejected);
        }

        let total = self.entries.invalidate_ruleset(ruleset_id).await?;
        self.record(total);
        info!(
            target = "wavecache::invalidation",
            ruleset = ruleset_id,
            invalidated = total,
            "ruleset invalidation"
        );
        Ok(InvalidationOutcome::Invalidated(total))
    }

    /// Invalidate every `Valid` row. Administrative.
    pub async fn full(&self) -> Result<InvalidationOutcome, RepoError> {
        if !self.enabled().await? {
            return Ok(InvalidationOutcome::Rejected);
        }

        let total = self.entries.invalidate_all().await?;
        self.record(total);
        info!(
            target = "wavecache::invalidation",
            invalidated = total,
            "full invalidation"
        );
        Ok(InvalidationOutcome::Invalidated(total))
    }

    async fn enabled(&self) -> Result<bool, RepoError> {
        self.switches.is_enabled(SwitchKind::Invalidate).await
    }

    fn record(&self, total: u64) {
        if total > 0 {
            counter!(METRIC_INVALIDATED).increment(total);
        }
    }
}
