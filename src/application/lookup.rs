//! The Lookup/Update protocol: the read and write contract shared by the
//! request-serving tier, the compute workers, and the precompute scheduler.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    application::{
        gateways::ResponseBroker,
        repos::{EntriesRepo, RepoError, SwitchesRepo, WriteEntryParams},
    },
    domain::{entities::MissReason, identity::DeviceIdentity, types::SwitchKind},
    infra::telemetry::{
        METRIC_LOOKUP_HIT, METRIC_LOOKUP_MISS, METRIC_UPDATE_REJECTED, METRIC_UPDATE_TOTAL,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Hit(Value),
    Miss(MissReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Ack,
    Rejected,
}

pub struct LookupService {
    entries: Arc<dyn EntriesRepo>,
    switches: Arc<dyn SwitchesRepo>,
    broker: Arc<dyn ResponseBroker>,
}

impl LookupService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        switches: Arc<dyn SwitchesRepo>,
        broker: Arc<dyn ResponseBroker>,
    ) -> Self {
        Self {
            entries,
            switches,
            broker,
        }
    }

    /// Read the cached answer for an identity tuple, if it may be served.
    ///
    /// A hit requires a `Valid` row, a digest match, and an unexpired
    /// validity window; everything else is a miss and the caller must go to
    /// the compute engine.
    pub async fn lookup(
        &self,
        identity: &DeviceIdentity,
        digest: &str,
    ) -> Result<LookupOutcome, RepoError> {
        let row = self.entries.find(identity).await?;
        let outcome = match row {
            None => LookupOutcome::Miss(MissReason::NoEntry),
            Some(entry) => match entry.eligible(digest, OffsetDateTime::now_utc()) {
                Ok(()) => LookupOutcome::Hit(entry.response),
                Err(reason) => LookupOutcome::Miss(reason),
            },
        };

        match &outcome {
            LookupOutcome::Hit(_) => {
                counter!(METRIC_LOOKUP_HIT).increment(1);
            }
            LookupOutcome::Miss(reason) => {
                counter!(METRIC_LOOKUP_MISS).increment(1);
                debug!(
                    target = "wavecache::lookup",
                    device_id = %identity.device_id,
                    reason = ?reason,
                    "cache miss"
                );
            }
        }

        Ok(outcome)
    }

    /// Upsert a freshly computed answer, the only path that produces a
    /// `Valid` row.
    ///
    /// With a correlation id, the response is also handed to the broker for
    /// the request-serving instance awaiting it. The store write and the
    /// delivery are issued concurrently; neither orders before the other,
    /// and a delivery failure does not fail the update.
    pub async fn update(
        &self,
        entry: WriteEntryParams,
        correlation_id: Option<String>,
    ) -> Result<UpdateOutcome, RepoError> {
        if !self.switches.is_enabled(SwitchKind::Update).await? {
            counter!(METRIC_UPDATE_REJECTED).increment(1);
            debug!(
                target = "wavecache::update",
                device_id = %entry.identity.device_id,
                "update rejected, switch disabled"
            );
            return Ok(UpdateOutcome::Rejected);
        }

        let delivery = correlation_id.map(|id| (id, entry.response.clone()));
        let device_id = entry.identity.device_id.clone();
        let write = self.entries.upsert_valid(entry);

        match delivery {
            Some((id, payload)) => {
                let deliver = self.broker.deliver(&id, &payload);
                let (written, delivered) = tokio::join!(write, deliver);
                if let Err(error) = delivered {
                    warn!(
                        target = "wavecache::update",
                        correlation_id = %id,
                        error = %error,
                        "response delivery failed; caller falls back to recompute"
                    );
                }
                written?;
            }
            None => write.await?,
        }

        counter!(METRIC_UPDATE_TOTAL).increment(1);
        debug!(
            target = "wavecache::update",
            device_id = %device_id,
            "entry updated"
        );
        Ok(UpdateOutcome::Ack)
    }
}
