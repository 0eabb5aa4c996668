//! Invalidation engine tests over in-memory repositories.

mod support;

use std::sync::Arc;

use serde_json::json;

use support::{
    FailingDirectory, MemoryRepositories, RecordingBroker, StaticDirectory, identity, write_params,
};
use wavecache::application::invalidation::{
    DEFAULT_SPATIAL_RADIUS_KM, InvalidationOutcome, InvalidationService, SpatialRadiusPolicy,
};
use wavecache::application::lookup::LookupService;
use wavecache::application::repos::{SwitchesRepo, WriteEntryParams};
use wavecache::domain::geo::{CoverageRegion, GeoPoint};
use wavecache::domain::types::{EntryState, SwitchKind};

fn invalidation(
    repos: &Arc<MemoryRepositories>,
    policy: SpatialRadiusPolicy,
) -> InvalidationService {
    InvalidationService::new(repos.clone(), repos.clone(), policy)
}

fn default_policy() -> SpatialRadiusPolicy {
    SpatialRadiusPolicy::new(None, DEFAULT_SPATIAL_RADIUS_KM)
}

async fn seed(repos: &Arc<MemoryRepositories>, serial: &str, lat: f64, lon: f64, ruleset: &str) {
    let broker = RecordingBroker::new();
    let lookup = LookupService::new(repos.clone(), repos.clone(), broker);
    let mut params: WriteEntryParams = write_params(serial, "d1", json!({"serial": serial}));
    params.coordinates = GeoPoint::new(lat, lon);
    params.config_ruleset = ruleset.to_string();
    lookup.update(params, None).await.unwrap();
}

fn region(lat: f64, lon: f64, radius_km: Option<f64>) -> CoverageRegion {
    CoverageRegion {
        center: GeoPoint::new(lat, lon),
        radius_km,
    }
}

#[tokio::test]
async fn spatial_invalidation_only_reaches_nearby_rows() {
    let repos = MemoryRepositories::new();
    let service = invalidation(&repos, default_policy());

    seed(&repos, "NEAR", 37.0, -122.0, "us_part15").await;
    seed(&repos, "FAR", 40.0, -100.0, "us_part15").await;

    let outcome = service
        .spatial(&[region(37.01, -122.01, Some(5.0))])
        .await
        .unwrap();

    assert_eq!(outcome, InvalidationOutcome::Invalidated(1));
    assert_eq!(
        repos.entry(&identity("NEAR")).unwrap().state,
        EntryState::Invalid
    );
    assert_eq!(
        repos.entry(&identity("FAR")).unwrap().state,
        EntryState::Valid
    );
}

#[tokio::test]
async fn spatial_invalidation_is_idempotent() {
    let repos = MemoryRepositories::new();
    let service = invalidation(&repos, default_policy());
    seed(&repos, "NEAR", 37.0, -122.0, "us_part15").await;

    let regions = [region(37.01, -122.01, Some(5.0))];
    let first = service.spatial(&regions).await.unwrap();
    let second = service.spatial(&regions).await.unwrap();

    assert_eq!(first, InvalidationOutcome::Invalidated(1));
    // Already-invalid rows do not transition again.
    assert_eq!(second, InvalidationOutcome::Invalidated(0));
    assert_eq!(
        repos.entry(&identity("NEAR")).unwrap().state,
        EntryState::Invalid
    );
}

#[tokio::test]
async fn missing_radius_falls_back_to_the_default() {
    let repos = MemoryRepositories::new();
    let service = invalidation(&repos, SpatialRadiusPolicy::new(None, 150.0));

    // ~111 km north of the region center: inside 150 km, outside any
    // explicit 5 km radius.
    seed(&repos, "D1", 38.0, -122.0, "us_part15").await;

    let outcome = service.spatial(&[region(37.0, -122.0, None)]).await.unwrap();
    assert_eq!(outcome, InvalidationOutcome::Invalidated(1));
}

#[tokio::test]
async fn directory_radius_wins_over_the_default() {
    let repos = MemoryRepositories::new();
    let directory = Arc::new(StaticDirectory(Some(5.0)));
    let service = invalidation(&repos, SpatialRadiusPolicy::new(Some(directory), 150.0));

    seed(&repos, "D1", 38.0, -122.0, "us_part15").await;

    // The directory narrows the radius to 5 km, so the 111 km-away row stays valid.
    let outcome = service.spatial(&[region(37.0, -122.0, None)]).await.unwrap();
    assert_eq!(outcome, InvalidationOutcome::Invalidated(0));
    assert_eq!(
        repos.entry(&identity("D1")).unwrap().state,
        EntryState::Valid
    );
}

#[tokio::test]
async fn unreachable_directory_degrades_to_the_default() {
    let repos = MemoryRepositories::new();
    let service = invalidation(
        &repos,
        SpatialRadiusPolicy::new(Some(Arc::new(FailingDirectory)), 150.0),
    );

    seed(&repos, "D1", 38.0, -122.0, "us_part15").await;

    let outcome = service.spatial(&[region(37.0, -122.0, None)]).await.unwrap();
    assert_eq!(outcome, InvalidationOutcome::Invalidated(1));
}

#[tokio::test]
async fn ruleset_invalidation_targets_the_producing_ruleset() {
    let repos = MemoryRepositories::new();
    let service = invalidation(&repos, default_policy());

    seed(&repos, "US", 37.0, -122.0, "us_part15").await;
    seed(&repos, "CA", 45.0, -75.0, "ca_rss248").await;

    let outcome = service.ruleset("us_part15").await.unwrap();
    assert_eq!(outcome, InvalidationOutcome::Invalidated(1));
    assert_eq!(
        repos.entry(&identity("US")).unwrap().state,
        EntryState::Invalid
    );
    assert_eq!(
        repos.entry(&identity("CA")).unwrap().state,
        EntryState::Valid
    );

    // Second run finds nothing left to transition.
    let outcome = service.ruleset("us_part15").await.unwrap();
    assert_eq!(outcome, InvalidationOutcome::Invalidated(0));
}

#[tokio::test]
async fn full_invalidation_reaches_every_valid_row() {
    let repos = MemoryRepositories::new();
    let service = invalidation(&repos, default_policy());

    seed(&repos, "A", 37.0, -122.0, "us_part15").await;
    seed(&repos, "B", 45.0, -75.0, "ca_rss248").await;
    repos.force_state(&identity("B"), EntryState::Precomputing);

    let outcome = service.full().await.unwrap();
    // Precomputing rows are left alone; only Valid rows transition.
    assert_eq!(outcome, InvalidationOutcome::Invalidated(1));
    assert_eq!(
        repos.entry(&identity("B")).unwrap().state,
        EntryState::Precomputing
    );
}

#[tokio::test]
async fn invalidation_preserves_replayable_payloads() {
    let repos = MemoryRepositories::new();
    let service = invalidation(&repos, default_policy());
    seed(&repos, "D1", 37.0, -122.0, "us_part15").await;

    service.full().await.unwrap();

    let entry = repos.entry(&identity("D1")).unwrap();
    assert_eq!(entry.request, json!({"serial": "D1"}));
    assert_eq!(entry.response, json!({"serial": "D1"}));
}

#[tokio::test]
async fn disabled_switch_rejects_every_mode() {
    let repos = MemoryRepositories::new();
    let service = invalidation(&repos, default_policy());
    seed(&repos, "D1", 37.0, -122.0, "us_part15").await;

    repos
        .set_enabled(SwitchKind::Invalidate, false)
        .await
        .unwrap();

    assert_eq!(
        service.full().await.unwrap(),
        InvalidationOutcome::Rejected
    );
    assert_eq!(
        service.ruleset("us_part15").await.unwrap(),
        InvalidationOutcome::Rejected
    );
    assert_eq!(
        service
            .spatial(&[region(37.0, -122.0, Some(5.0))])
            .await
            .unwrap(),
        InvalidationOutcome::Rejected
    );
    assert_eq!(
        repos.entry(&identity("D1")).unwrap().state,
        EntryState::Valid
    );
}
