use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, SwitchesRepo},
    domain::{entities::SwitchRecord, types::SwitchKind},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SwitchRow {
    name: SwitchKind,
    enabled: bool,
}

impl From<SwitchRow> for SwitchRecord {
    fn from(row: SwitchRow) -> Self {
        Self {
            name: row.name,
            enabled: row.enabled,
        }
    }
}

#[async_trait]
impl SwitchesRepo for PostgresRepositories {
    async fn is_enabled(&self, switch: SwitchKind) -> Result<bool, RepoError> {
        let enabled =
            sqlx::query_scalar::<_, bool>("SELECT enabled FROM switches WHERE name = $1")
                .bind(switch)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        // A missing row reads as enabled, matching the seeded default.
        Ok(enabled.unwrap_or(true))
    }

    async fn set_enabled(&self, switch: SwitchKind, enabled: bool) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO switches (name, enabled)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET enabled = EXCLUDED.enabled
            "#,
        )
        .bind(switch)
        .bind(enabled)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn all(&self) -> Result<Vec<SwitchRecord>, RepoError> {
        let rows =
            sqlx::query_as::<_, SwitchRow>("SELECT name, enabled FROM switches ORDER BY name")
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SwitchRecord::from).collect())
    }
}
