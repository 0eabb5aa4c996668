use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    application::repos::{EntriesRepo, RepoError, StateCounts, WriteEntryParams},
    domain::{
        entities::CacheEntryRecord, geo::GeoPoint, identity::DeviceIdentity, types::EntryState,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const ENTRY_COLUMNS: &str = "device_id, ruleset_set, cert_set, state, config_ruleset, \
     lat, lon, last_update, req_cfg_digest, validity_period_sec, attempts, request, response";

// Great-circle distance (km) between a bound point and the row's coordinates.
// The acos argument is clamped; floating error can push it past ±1 for
// near-identical points.
const DISTANCE_KM_EXPR: &str = "6371.0 * acos(LEAST(1.0, GREATEST(-1.0, \
       sin(radians($3)) * sin(radians(lat)) \
     + cos(radians($3)) * cos(radians(lat)) * cos(radians(lon) - radians($4)))))";

#[derive(sqlx::FromRow)]
struct EntryRow {
    device_id: String,
    ruleset_set: String,
    cert_set: String,
    state: EntryState,
    config_ruleset: String,
    lat: f64,
    lon: f64,
    last_update: OffsetDateTime,
    req_cfg_digest: String,
    validity_period_sec: f64,
    attempts: i32,
    request: Value,
    response: Value,
}

impl From<EntryRow> for CacheEntryRecord {
    fn from(row: EntryRow) -> Self {
        Self {
            identity: DeviceIdentity::from_stored(row.device_id, row.ruleset_set, row.cert_set),
            state: row.state,
            config_ruleset: row.config_ruleset,
            coordinates: GeoPoint::new(row.lat, row.lon),
            last_update: row.last_update,
            req_cfg_digest: row.req_cfg_digest,
            validity_period_sec: row.validity_period_sec,
            attempts: row.attempts,
            request: row.request,
            response: row.response,
        }
    }
}

#[async_trait]
impl EntriesRepo for PostgresRepositories {
    async fn find(&self, identity: &DeviceIdentity) -> Result<Option<CacheEntryRecord>, RepoError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS}
               FROM aps
              WHERE device_id = $1 AND ruleset_set = $2 AND cert_set = $3"
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(&identity.device_id)
            .bind(&identity.ruleset_set)
            .bind(&identity.cert_set)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CacheEntryRecord::from))
    }

    async fn upsert_valid(&self, params: WriteEntryParams) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO aps (
                device_id, ruleset_set, cert_set, state, config_ruleset,
                lat, lon, last_update, req_cfg_digest, validity_period_sec,
                attempts, request, response
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, now(), $8, $9, 0, $10, $11)
            ON CONFLICT (device_id, ruleset_set, cert_set) DO UPDATE SET
                state = EXCLUDED.state,
                config_ruleset = EXCLUDED.config_ruleset,
                lat = EXCLUDED.lat,
                lon = EXCLUDED.lon,
                last_update = EXCLUDED.last_update,
                req_cfg_digest = EXCLUDED.req_cfg_digest,
                validity_period_sec = EXCLUDED.validity_period_sec,
                attempts = 0,
                request = EXCLUDED.request,
                response = EXCLUDED.response
            "#,
        )
        .bind(&params.identity.device_id)
        .bind(&params.identity.ruleset_set)
        .bind(&params.identity.cert_set)
        .bind(EntryState::Valid)
        .bind(&params.config_ruleset)
        .bind(params.coordinates.lat_deg)
        .bind(params.coordinates.lon_deg)
        .bind(&params.req_cfg_digest)
        .bind(params.validity_period_sec)
        .bind(&params.request)
        .bind(&params.response)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn invalidate_all(&self) -> Result<u64, RepoError> {
        let result = sqlx::query("UPDATE aps SET state = $1, attempts = 0 WHERE state = $2")
            .bind(EntryState::Invalid)
            .bind(EntryState::Valid)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn invalidate_ruleset(&self, ruleset_id: &str) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE aps SET state = $1, attempts = 0 WHERE state = $2 AND config_ruleset = $3",
        )
        .bind(EntryState::Invalid)
        .bind(EntryState::Valid)
        .bind(ruleset_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn invalidate_within(&self, center: GeoPoint, radius_km: f64) -> Result<u64, RepoError> {
        let sql = format!(
            "UPDATE aps SET state = $1, attempts = 0
              WHERE state = $2 AND {DISTANCE_KM_EXPR} <= $5"
        );
        let result = sqlx::query(&sql)
            .bind(EntryState::Invalid)
            .bind(EntryState::Valid)
            .bind(center.lat_deg)
            .bind(center.lon_deg)
            .bind(radius_km)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn claim_next_invalid(
        &self,
        max_attempts: i32,
    ) -> Result<Option<CacheEntryRecord>, RepoError> {
        // SKIP LOCKED keeps concurrent scheduler workers from selecting the
        // same candidate; the outer state condition makes the claim a no-op
        // if the row changed hands between select and update.
        let sql = format!(
            "UPDATE aps
                SET state = $1
              WHERE (device_id, ruleset_set, cert_set) IN (
                        SELECT device_id, ruleset_set, cert_set
                          FROM aps
                         WHERE state = $2 AND attempts < $3
                         ORDER BY attempts ASC, last_update ASC
                         LIMIT 1
                           FOR UPDATE SKIP LOCKED
                    )
                AND state = $2
            RETURNING {ENTRY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(EntryState::Precomputing)
            .bind(EntryState::Invalid)
            .bind(max_attempts)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CacheEntryRecord::from))
    }

    async fn release_claim(&self, identity: &DeviceIdentity) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE aps
               SET state = $1, attempts = attempts + 1, last_update = now()
             WHERE device_id = $2 AND ruleset_set = $3 AND cert_set = $4 AND state = $5
            "#,
        )
        .bind(EntryState::Invalid)
        .bind(&identity.device_id)
        .bind(&identity.ruleset_set)
        .bind(&identity.cert_set)
        .bind(EntryState::Precomputing)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn reclaim_stuck(&self, stuck_before: OffsetDateTime) -> Result<u64, RepoError> {
        let result =
            sqlx::query("UPDATE aps SET state = $1 WHERE state = $2 AND last_update < $3")
                .bind(EntryState::Invalid)
                .bind(EntryState::Precomputing)
                .bind(stuck_before)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn state_counts(&self) -> Result<StateCounts, RepoError> {
        #[derive(sqlx::FromRow)]
        struct CountRow {
            state: EntryState,
            count: i64,
        }

        let rows = sqlx::query_as::<_, CountRow>(
            "SELECT state, COUNT(*) AS count FROM aps GROUP BY state",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut counts = StateCounts::default();
        for row in rows {
            let count = u64::try_from(row.count).unwrap_or(0);
            match row.state {
                EntryState::Valid => counts.valid = count,
                EntryState::Invalid => counts.invalid = count,
                EntryState::Precomputing => counts.precomputing = count,
            }
        }

        Ok(counts)
    }
}
