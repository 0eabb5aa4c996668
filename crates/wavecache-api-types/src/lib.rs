//! Shared request and response types for the wavecache administrative API.
//!
//! Consumed by the service's REST surface and by `wavecache-cli`. With the
//! `sqlx` feature enabled, [`SwitchKind`] maps onto the persisted Postgres
//! enum so the service can bind it directly in queries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operational switch identifiers (mirrors Postgres enum `switch_kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "switch_kind", rename_all = "snake_case"))]
pub enum SwitchKind {
    Update,
    Invalidate,
    Precompute,
}

impl SwitchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SwitchKind::Update => "update",
            SwitchKind::Invalidate => "invalidate",
            SwitchKind::Precompute => "precompute",
        }
    }
}

/// Why a lookup did not produce a cached response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    NoEntry,
    NotValid,
    DigestMismatch,
    Expired,
}

/// `GET /status` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub switches: SwitchStates,
    pub precompute: PrecomputeStatus,
    pub entries: EntryCounts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwitchStates {
    pub update: bool,
    pub invalidate: bool,
    pub precompute: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrecomputeStatus {
    pub quota: u32,
    pub in_flight: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryCounts {
    pub valid: u64,
    pub invalid: u64,
    pub precomputing: u64,
}

/// A changed geospatial region submitted for spatial invalidation.
///
/// `radius_km` is optional; the service resolves a missing radius through
/// its ruleset directory, falling back to a configured default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionBody {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,
}

/// `POST /invalidate` request body. Exactly one of the three fields must be
/// present; the service rejects ambiguous bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<RegionBody>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvalidateResponse {
    Invalidated { count: u64 },
    Rejected,
}

/// `PUT /precompute/quota` request body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaRequest {
    pub quota: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaResponse {
    pub quota: u32,
}

/// Switch toggle acknowledgement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwitchResponse {
    pub switch: SwitchKind,
    pub enabled: bool,
}

/// `POST /lookup` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    pub device_id: String,
    pub rulesets: Vec<String>,
    pub certifications: Vec<String>,
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupResponse {
    Hit { response: Value },
    Miss { reason: MissReason },
}

/// `POST /update` request body: the full cache-entry envelope, plus an
/// optional correlation id for point-to-point delivery of synchronous
/// responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub device_id: String,
    pub rulesets: Vec<String>,
    pub certifications: Vec<String>,
    pub config_ruleset: String,
    pub lat: f64,
    pub lon: f64,
    pub req_cfg_digest: String,
    pub validity_period_sec: f64,
    pub request: Value,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateResponse {
    Ack,
    Rejected,
}

/// Compute-engine reply envelope: everything the cache needs to write a
/// fresh entry for a replayed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeEnvelope {
    pub response: Value,
    pub config_ruleset: String,
    pub lat: f64,
    pub lon: f64,
    pub req_cfg_digest: String,
    pub validity_period_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_response_tags_outcome() {
        let hit = LookupResponse::Hit {
            response: serde_json::json!({"channels": [36, 40]}),
        };
        let encoded = serde_json::to_value(&hit).unwrap();
        assert_eq!(encoded["outcome"], "hit");

        let miss = LookupResponse::Miss {
            reason: MissReason::DigestMismatch,
        };
        let encoded = serde_json::to_value(&miss).unwrap();
        assert_eq!(encoded["outcome"], "miss");
        assert_eq!(encoded["reason"], "digest_mismatch");
    }

    #[test]
    fn invalidate_request_omits_absent_fields() {
        let body = InvalidateRequest {
            ruleset_id: Some("US_47_CFR_PART_15E".to_string()),
            ..InvalidateRequest::default()
        };
        let encoded = serde_json::to_string(&body).unwrap();
        assert!(!encoded.contains("all"));
        assert!(!encoded.contains("regions"));
    }

    #[test]
    fn switch_kind_round_trips_as_snake_case() {
        let encoded = serde_json::to_string(&SwitchKind::Precompute).unwrap();
        assert_eq!(encoded, "\"precompute\"");
        let decoded: SwitchKind = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, SwitchKind::Precompute);
    }
}
