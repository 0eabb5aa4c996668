//! In-memory repository and gateway doubles for service-level tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::watch;

use wavecache::application::gateways::{
    ComputeBackend, ComputeEnvelope, GatewayError, ResponseBroker, RulesetDirectory,
};
use wavecache::application::repos::{
    EntriesRepo, RepoError, StateCounts, SwitchesRepo, WriteEntryParams,
};
use wavecache::domain::entities::{CacheEntryRecord, SwitchRecord};
use wavecache::domain::geo::{GeoPoint, great_circle_km};
use wavecache::domain::identity::DeviceIdentity;
use wavecache::domain::types::{EntryState, SwitchKind};

/// Hash-map store mirroring the conditional-update semantics of the
/// Postgres repositories: every transition checks the current state under
/// one lock acquisition, so claims are exclusive.
pub struct MemoryRepositories {
    entries: Mutex<HashMap<DeviceIdentity, CacheEntryRecord>>,
    switches: Mutex<HashMap<SwitchKind, bool>>,
}

impl MemoryRepositories {
    pub fn new() -> Arc<Self> {
        let mut switches = HashMap::new();
        for kind in [
            SwitchKind::Update,
            SwitchKind::Invalidate,
            SwitchKind::Precompute,
        ] {
            switches.insert(kind, true);
        }
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            switches: Mutex::new(switches),
        })
    }

    pub fn entry(&self, identity: &DeviceIdentity) -> Option<CacheEntryRecord> {
        self.entries.lock().unwrap().get(identity).cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Test hook: force a row's state without the usual transition checks.
    pub fn force_state(&self, identity: &DeviceIdentity, state: EntryState) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(identity) {
            entry.state = state;
        }
    }

    /// Test hook: age a row by rewriting its timestamp.
    pub fn force_last_update(&self, identity: &DeviceIdentity, last_update: OffsetDateTime) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(identity) {
            entry.last_update = last_update;
        }
    }

    pub fn force_attempts(&self, identity: &DeviceIdentity, attempts: i32) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(identity) {
            entry.attempts = attempts;
        }
    }
}

#[async_trait]
impl EntriesRepo for MemoryRepositories {
    async fn find(&self, identity: &DeviceIdentity) -> Result<Option<CacheEntryRecord>, RepoError> {
        Ok(self.entries.lock().unwrap().get(identity).cloned())
    }

    async fn upsert_valid(&self, params: WriteEntryParams) -> Result<(), RepoError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            params.identity.clone(),
            CacheEntryRecord {
                identity: params.identity,
                state: EntryState::Valid,
                config_ruleset: params.config_ruleset,
                coordinates: params.coordinates,
                last_update: OffsetDateTime::now_utc(),
                req_cfg_digest: params.req_cfg_digest,
                validity_period_sec: params.validity_period_sec,
                attempts: 0,
                request: params.request,
                response: params.response,
            },
        );
        Ok(())
    }

    async fn invalidate_all(&self) -> Result<u64, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let mut changed = 0;
        for entry in entries.values_mut() {
            if entry.state == EntryState::Valid {
                entry.state = EntryState::Invalid;
                entry.attempts = 0;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn invalidate_ruleset(&self, ruleset_id: &str) -> Result<u64, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let mut changed = 0;
        for entry in entries.values_mut() {
            if entry.state == EntryState::Valid && entry.config_ruleset == ruleset_id {
                entry.state = EntryState::Invalid;
                entry.attempts = 0;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn invalidate_within(&self, center: GeoPoint, radius_km: f64) -> Result<u64, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let mut changed = 0;
        for entry in entries.values_mut() {
            if entry.state == EntryState::Valid
                && great_circle_km(entry.coordinates, center) <= radius_km
            {
                entry.state = EntryState::Invalid;
                entry.attempts = 0;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn claim_next_invalid(
        &self,
        max_attempts: i32,
    ) -> Result<Option<CacheEntryRecord>, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let candidate = entries
            .values()
            .filter(|e| e.state == EntryState::Invalid && e.attempts < max_attempts)
            .min_by_key(|e| (e.attempts, e.last_update))
            .map(|e| e.identity.clone());

        Ok(candidate.and_then(|identity| {
            entries.get_mut(&identity).map(|entry| {
                entry.state = EntryState::Precomputing;
                entry.clone()
            })
        }))
    }

    async fn release_claim(&self, identity: &DeviceIdentity) -> Result<bool, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(identity) {
            Some(entry) if entry.state == EntryState::Precomputing => {
                entry.state = EntryState::Invalid;
                entry.attempts += 1;
                entry.last_update = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reclaim_stuck(&self, stuck_before: OffsetDateTime) -> Result<u64, RepoError> {
        let mut entries = self.entries.lock().unwrap();
        let mut reclaimed = 0;
        for entry in entries.values_mut() {
            if entry.state == EntryState::Precomputing && entry.last_update < stuck_before {
                entry.state = EntryState::Invalid;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn state_counts(&self) -> Result<StateCounts, RepoError> {
        let entries = self.entries.lock().unwrap();
        let mut counts = StateCounts::default();
        for entry in entries.values() {
            match entry.state {
                EntryState::Valid => counts.valid += 1,
                EntryState::Invalid => counts.invalid += 1,
                EntryState::Precomputing => counts.precomputing += 1,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl SwitchesRepo for MemoryRepositories {
    async fn is_enabled(&self, switch: SwitchKind) -> Result<bool, RepoError> {
        Ok(self
            .switches
            .lock()
            .unwrap()
            .get(&switch)
            .copied()
            .unwrap_or(true))
    }

    async fn set_enabled(&self, switch: SwitchKind, enabled: bool) -> Result<(), RepoError> {
        self.switches.lock().unwrap().insert(switch, enabled);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<SwitchRecord>, RepoError> {
        let switches = self.switches.lock().unwrap();
        Ok(switches
            .iter()
            .map(|(name, enabled)| SwitchRecord {
                name: *name,
                enabled: *enabled,
            })
            .collect())
    }
}

/// Compute engine double scripted per device serial (read from the stored
/// request payload's `serial` field). An optional gate holds every call
/// until released, for observing in-flight concurrency.
pub struct ScriptedCompute {
    plans: Mutex<HashMap<String, Result<ComputeEnvelope, String>>>,
    gate: Mutex<Option<watch::Receiver<bool>>>,
    calls: AtomicUsize,
}

impl ScriptedCompute {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn plan_success(&self, serial: &str, envelope: ComputeEnvelope) {
        self.plans
            .lock()
            .unwrap()
            .insert(serial.to_string(), Ok(envelope));
    }

    pub fn plan_failure(&self, serial: &str, message: &str) {
        self.plans
            .lock()
            .unwrap()
            .insert(serial.to_string(), Err(message.to_string()));
    }

    /// Hold every subsequent call until `true` is sent on the returned
    /// channel (or the sender is dropped).
    pub fn hold(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputeBackend for ScriptedCompute {
    async fn recompute(&self, request: &Value) -> Result<ComputeEnvelope, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(mut rx) = gate {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }

        let serial = request
            .get("serial")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let plan = self.plans.lock().unwrap().get(&serial).cloned();
        match plan {
            Some(Ok(envelope)) => Ok(envelope),
            Some(Err(message)) => Err(GatewayError::transport(message)),
            None => Err(GatewayError::malformed(format!(
                "no scripted plan for `{serial}`"
            ))),
        }
    }
}

/// Broker double recording deliveries, optionally failing them.
pub struct RecordingBroker {
    deliveries: Mutex<Vec<(String, Value)>>,
    fail: AtomicBool,
}

impl RecordingBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            deliveries: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<(String, Value)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseBroker for RecordingBroker {
    async fn deliver(&self, correlation_id: &str, response: &Value) -> Result<(), GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::delivery("scripted delivery failure"));
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((correlation_id.to_string(), response.clone()));
        Ok(())
    }
}

/// Directory double answering with a fixed radius.
pub struct StaticDirectory(pub Option<f64>);

#[async_trait]
impl RulesetDirectory for StaticDirectory {
    async fn invalidation_radius_km(&self) -> Result<Option<f64>, GatewayError> {
        Ok(self.0)
    }
}

/// Directory double that is always unreachable.
pub struct FailingDirectory;

#[async_trait]
impl RulesetDirectory for FailingDirectory {
    async fn invalidation_radius_km(&self) -> Result<Option<f64>, GatewayError> {
        Err(GatewayError::transport("directory unreachable"))
    }
}

pub fn identity(serial: &str) -> DeviceIdentity {
    DeviceIdentity::new(serial, &["us_part15"], &["FCC:77"]).expect("valid identity")
}

pub fn write_params(serial: &str, digest: &str, response: Value) -> WriteEntryParams {
    WriteEntryParams {
        identity: identity(serial),
        config_ruleset: "us_part15".to_string(),
        coordinates: GeoPoint::new(37.0, -122.0),
        req_cfg_digest: digest.to_string(),
        validity_period_sec: 3600.0,
        request: json!({"serial": serial}),
        response,
    }
}

pub fn envelope(digest: &str, response: Value) -> ComputeEnvelope {
    ComputeEnvelope {
        response,
        config_ruleset: "us_part15".to_string(),
        lat: 37.0,
        lon: -122.0,
        req_cfg_digest: digest.to_string(),
        validity_period_sec: 3600.0,
    }
}
