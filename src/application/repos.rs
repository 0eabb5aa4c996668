//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::{
    entities::{CacheEntryRecord, SwitchRecord},
    geo::GeoPoint,
    identity::DeviceIdentity,
    types::SwitchKind,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Everything an Update writes. The repo stamps `last_update` and resets
/// the failure counter; `state` is always `valid` on this path.
#[derive(Debug, Clone)]
pub struct WriteEntryParams {
    pub identity: DeviceIdentity,
    pub config_ruleset: String,
    pub coordinates: GeoPoint,
    pub req_cfg_digest: String,
    pub validity_period_sec: f64,
    pub request: Value,
    pub response: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub valid: u64,
    pub invalid: u64,
    pub precomputing: u64,
}

/// Persistence contract for the `aps` table.
///
/// Every state transition is a single conditional update keyed on the
/// row's identity and current state, so exclusivity comes from the store.
#[async_trait]
pub trait EntriesRepo: Send + Sync {
    async fn find(&self, identity: &DeviceIdentity) -> Result<Option<CacheEntryRecord>, RepoError>;

    /// Upsert the row for the identity tuple to `valid`. The only path that
    /// ever produces a `valid` row.
    async fn upsert_valid(&self, params: WriteEntryParams) -> Result<(), RepoError>;

    /// Transition every `valid` row to `invalid`. Returns rows changed.
    async fn invalidate_all(&self) -> Result<u64, RepoError>;

    /// Transition `valid` rows computed under `ruleset_id` to `invalid`.
    async fn invalidate_ruleset(&self, ruleset_id: &str) -> Result<u64, RepoError>;

    /// Transition `valid` rows within `radius_km` (great-circle) of
    /// `center` to `invalid`.
    async fn invalidate_within(&self, center: GeoPoint, radius_km: f64) -> Result<u64, RepoError>;

    /// Atomically claim one `invalid` row with fewer than `max_attempts`
    /// failures, transitioning it to `precomputing`. Claim order is
    /// fewest-failures first, then oldest `last_update`, so no row starves.
    /// Returns `None` when nothing is claimable.
    async fn claim_next_invalid(
        &self,
        max_attempts: i32,
    ) -> Result<Option<CacheEntryRecord>, RepoError>;

    /// Revert a failed claim: `precomputing → invalid`, one more recorded
    /// attempt, `last_update` re-stamped so the row rejoins the back of the
    /// queue. Returns whether the row was still `precomputing`.
    async fn release_claim(&self, identity: &DeviceIdentity) -> Result<bool, RepoError>;

    /// Revert `precomputing` rows stranded before `stuck_before` back to
    /// `invalid` without charging an attempt. Returns rows reclaimed.
    async fn reclaim_stuck(&self, stuck_before: OffsetDateTime) -> Result<u64, RepoError>;

    async fn state_counts(&self) -> Result<StateCounts, RepoError>;
}

/// Persistence contract for the `switches` table. Read fresh on every
/// gated operation; never cached in process memory, so one operator write
/// is observed by every instance immediately.
#[async_trait]
pub trait SwitchesRepo: Send + Sync {
    async fn is_enabled(&self, switch: SwitchKind) -> Result<bool, RepoError>;
    async fn set_enabled(&self, switch: SwitchKind, enabled: bool) -> Result<(), RepoError>;
    async fn all(&self) -> Result<Vec<SwitchRecord>, RepoError>;
}
