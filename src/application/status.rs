//! Operational status assembly for the REST surface.

use std::sync::Arc;

use wavecache_api_types::{EntryCounts, PrecomputeStatus, StatusResponse, SwitchStates};

use crate::{
    application::{
        precompute::PrecomputeQuota,
        repos::{EntriesRepo, RepoError, SwitchesRepo},
    },
    domain::types::SwitchKind,
};

pub struct StatusService {
    entries: Arc<dyn EntriesRepo>,
    switches: Arc<dyn SwitchesRepo>,
    quota: PrecomputeQuota,
}

impl StatusService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        switches: Arc<dyn SwitchesRepo>,
        quota: PrecomputeQuota,
    ) -> Self {
        Self {
            entries,
            switches,
            quota,
        }
    }

    pub async fn status(&self) -> Result<StatusResponse, RepoError> {
        let counts = self.entries.state_counts().await?;

        // Missing rows read as enabled, matching the seeded default.
        let mut states = SwitchStates {
            update: true,
            invalidate: true,
            precompute: true,
        };
        for record in self.switches.all().await? {
            match record.name {
                SwitchKind::Update => states.update = record.enabled,
                SwitchKind::Invalidate => states.invalidate = record.enabled,
                SwitchKind::Precompute => states.precompute = record.enabled,
            }
        }

        Ok(StatusResponse {
            switches: states,
            precompute: PrecomputeStatus {
                quota: self.quota.get(),
                in_flight: counts.precomputing,
            },
            entries: EntryCounts {
                valid: counts.valid,
                invalid: counts.invalid,
                precomputing: counts.precomputing,
            },
        })
    }
}
