//! Precompute scheduler: drains `Invalid` rows back to `Valid` before they
//! are requested again, hiding recomputation latency from callers.
//!
//! Per-row state machine: `Invalid --claim--> Precomputing --success-->
//! Valid`, `Precomputing --failure--> Invalid`. The claim is a single
//! conditional store update, so at most one worker ever recomputes a row
//! concurrently, across every service instance sharing the table.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use metrics::{counter, gauge};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    application::{
        gateways::ComputeBackend,
        lookup::{LookupService, UpdateOutcome},
        repos::{EntriesRepo, RepoError, SwitchesRepo, WriteEntryParams},
    },
    domain::{
        entities::CacheEntryRecord, geo::GeoPoint, identity::DeviceIdentity, types::SwitchKind,
    },
    infra::telemetry::{
        METRIC_PRECOMPUTE_FAILURE, METRIC_PRECOMPUTE_INFLIGHT, METRIC_PRECOMPUTE_SUCCESS,
    },
};

/// The live concurrency bound, shared between the scheduler and the REST
/// surface so `PUT /precompute/quota` takes effect on the next pass.
#[derive(Debug, Clone)]
pub struct PrecomputeQuota(Arc<AtomicU32>);

impl PrecomputeQuota {
    pub fn new(initial: u32) -> Self {
        Self(Arc::new(AtomicU32::new(initial)))
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, quota: u32) {
        self.0.store(quota, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct PrecomputeSettings {
    /// Cadence of the scan-and-claim loop.
    pub scan_interval: Duration,
    /// Upper bound on claims issued in a single pass.
    pub batch: u32,
    /// Rows with this many consecutive failures are no longer claimed.
    pub max_attempts: i32,
    /// Age past which a `Precomputing` row is considered stranded.
    pub reclaim_after: Duration,
}

#[derive(Clone)]
pub struct PrecomputeService {
    entries: Arc<dyn EntriesRepo>,
    switches: Arc<dyn SwitchesRepo>,
    compute: Arc<dyn ComputeBackend>,
    lookup: Arc<LookupService>,
    quota: PrecomputeQuota,
    settings: PrecomputeSettings,
}

impl PrecomputeService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        switches: Arc<dyn SwitchesRepo>,
        compute: Arc<dyn ComputeBackend>,
        lookup: Arc<LookupService>,
        quota: PrecomputeQuota,
        settings: PrecomputeSettings,
    ) -> Self {
        Self {
            entries,
            switches,
            compute,
            lookup,
            quota,
            settings,
        }
    }

    pub fn quota(&self) -> &PrecomputeQuota {
        &self.quota
    }

    /// One scheduler pass.
    ///
    /// Reads the Precompute switch fresh, measures the store-wide in-flight
    /// count against the quota, then claims and dispatches at most the free
    /// quota (capped by the per-pass batch). Each claimed row recomputes on
    /// its own task; the returned handles are only awaited by tests.
    pub async fn tick(&self) -> Result<Vec<JoinHandle<()>>, RepoError> {
        if !self.switches.is_enabled(SwitchKind::Precompute).await? {
            return Ok(Vec::new());
        }

        let counts = self.entries.state_counts().await?;
        gauge!(METRIC_PRECOMPUTE_INFLIGHT).set(counts.precomputing as f64);

        let available = u64::from(self.quota.get())
            .saturating_sub(counts.precomputing)
            .min(u64::from(self.settings.batch));

        let mut handles = Vec::new();
        for _ in 0..available {
            let Some(entry) = self
                .entries
                .claim_next_invalid(self.settings.max_attempts)
                .await?
            else {
                break;
            };

            debug!(
                target = "wavecache::precompute",
                device_id = %entry.identity.device_id,
                attempts = entry.attempts,
                "claimed entry for recompute"
            );
            let service = self.clone();
            handles.push(tokio::spawn(async move {
                service.recompute_entry(entry).await;
            }));
        }

        Ok(handles)
    }

    /// Drive passes forever at the configured cadence. Store errors are
    /// logged and retried on the next pass rather than escalated.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.settings.scan_interval);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            if let Err(error) = self.tick().await {
                warn!(
                    target = "wavecache::precompute",
                    error = %error,
                    "scheduler pass failed, backing off to next tick"
                );
            }
        }
    }

    /// Revert `Precomputing` rows stranded longer than the reclaim timeout
    /// (a worker died mid-recompute) back to `Invalid`. Run at startup and
    /// periodically by the reclaim cron job.
    pub async fn reclaim_stuck(&self) -> Result<u64, RepoError> {
        let stuck_before = OffsetDateTime::now_utc() - self.settings.reclaim_after;
        let reclaimed = self.entries.reclaim_stuck(stuck_before).await?;
        if reclaimed > 0 {
            warn!(
                target = "wavecache::precompute",
                reclaimed, "reverted stranded precomputing rows"
            );
        }
        Ok(reclaimed)
    }

    async fn recompute_entry(&self, entry: CacheEntryRecord) {
        let identity = entry.identity.clone();
        match self.compute.recompute(&entry.request).await {
            Ok(envelope) => {
                let params = WriteEntryParams {
                    identity: identity.clone(),
                    config_ruleset: envelope.config_ruleset,
                    coordinates: GeoPoint::new(envelope.lat, envelope.lon),
                    req_cfg_digest: envelope.req_cfg_digest,
                    validity_period_sec: envelope.validity_period_sec,
                    request: entry.request,
                    response: envelope.response,
                };
                match self.lookup.update(params, None).await {
                    Ok(UpdateOutcome::Ack) => {
                        counter!(METRIC_PRECOMPUTE_SUCCESS).increment(1);
                        info!(
                            target = "wavecache::precompute",
                            device_id = %identity.device_id,
                            "entry recomputed"
                        );
                    }
                    Ok(UpdateOutcome::Rejected) => {
                        self.abandon(&identity, "update switch disabled").await;
                    }
                    Err(err) => {
                        self.abandon(&identity, &err.to_string()).await;
                    }
                }
            }
            Err(err) => {
                self.abandon(&identity, &err.to_string()).await;
            }
        }
    }

    /// A failed attempt: charge it and return the row to the claimable
    /// queue. The re-stamped `last_update` is the backoff: the row rejoins
    /// behind every other claimable row.
    async fn abandon(&self, identity: &DeviceIdentity, reason: &str) {
        counter!(METRIC_PRECOMPUTE_FAILURE).increment(1);
        warn!(
            target = "wavecache::precompute",
            device_id = %identity.device_id,
            reason,
            "recompute attempt failed"
        );
        if let Err(error) = self.entries.release_claim(identity).await {
            error!(
                target = "wavecache::precompute",
                device_id = %identity.device_id,
                error = %error,
                "failed to release precompute claim; reclaim sweep will recover it"
            );
        }
    }
}
