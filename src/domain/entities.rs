//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

pub use wavecache_api_types::MissReason;

use crate::domain::{geo::GeoPoint, identity::DeviceIdentity, types::EntryState};

/// One cached answer for one device identity tuple.
///
/// The `request` payload is retained verbatim so the precompute scheduler
/// can replay it without caller involvement; `response` is the cached
/// answer served on a hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntryRecord {
    pub identity: DeviceIdentity,
    pub state: EntryState,
    pub config_ruleset: String,
    pub coordinates: GeoPoint,
    pub last_update: OffsetDateTime,
    pub req_cfg_digest: String,
    pub validity_period_sec: f64,
    pub attempts: i32,
    pub request: Value,
    pub response: Value,
}

impl CacheEntryRecord {
    /// Whether this row may satisfy a read carrying `digest` at `now`.
    ///
    /// Serving requires all three: the row is `Valid`, the stored digest
    /// matches, and the caller-declared validity window has not elapsed.
    pub fn eligible(&self, digest: &str, now: OffsetDateTime) -> Result<(), MissReason> {
        if self.state != EntryState::Valid {
            return Err(MissReason::NotValid);
        }
        if self.req_cfg_digest != digest {
            return Err(MissReason::DigestMismatch);
        }
        if now >= self.expires_at() {
            return Err(MissReason::Expired);
        }
        Ok(())
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.last_update + Duration::seconds_f64(self.validity_period_sec)
    }
}

/// A persisted operational switch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwitchRecord {
    pub name: crate::domain::types::SwitchKind,
    pub enabled: bool,
}
