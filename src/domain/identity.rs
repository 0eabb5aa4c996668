//! Canonical device identity: the cache's primary-key granularity.
//!
//! A device is keyed by its serial number plus two attribute sets: the
//! regulatory rulesets its request falls under and its certification ids.
//! Both sets are canonicalized (trimmed, sorted, deduplicated) so that the
//! same device always maps to the same row regardless of the order a caller
//! lists its attributes in.

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

const SET_SEPARATOR: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub ruleset_set: String,
    pub cert_set: String,
}

impl DeviceIdentity {
    /// Build an identity from raw attribute lists, canonicalizing both sets.
    pub fn new<S: AsRef<str>>(
        device_id: &str,
        rulesets: &[S],
        certifications: &[S],
    ) -> Result<Self, DomainError> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(DomainError::validation("device_id must not be empty"));
        }
        let ruleset_set = canonical_set(rulesets);
        if ruleset_set.is_empty() {
            return Err(DomainError::validation(
                "at least one ruleset id is required",
            ));
        }
        let cert_set = canonical_set(certifications);
        if cert_set.is_empty() {
            return Err(DomainError::validation(
                "at least one certification id is required",
            ));
        }

        Ok(Self {
            device_id: device_id.to_string(),
            ruleset_set,
            cert_set,
        })
    }

    /// Rebuild an identity from already-canonical stored columns.
    pub fn from_stored(device_id: String, ruleset_set: String, cert_set: String) -> Self {
        Self {
            device_id,
            ruleset_set,
            cert_set,
        }
    }
}

fn canonical_set<S: AsRef<str>>(values: &[S]) -> String {
    let mut parts: Vec<&str> = values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !v.is_empty())
        .collect();
    parts.sort_unstable();
    parts.dedup();
    parts.join(SET_SEPARATOR)
}
