//! Point-to-point response delivery over Postgres NOTIFY.
//!
//! A synchronous caller's request-serving instance listens on a channel
//! derived from the request's correlation id; the instance that finishes
//! the computation notifies that channel with the response payload. The
//! consumer-side wiring lives with the request-serving tier.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;

use crate::application::gateways::{GatewayError, ResponseBroker};

/// NOTIFY payloads are capped by Postgres at just under 8000 bytes.
const MAX_NOTIFY_PAYLOAD_BYTES: usize = 7800;

pub struct PgResponseBroker {
    pool: Arc<PgPool>,
    channel_prefix: String,
}

impl PgResponseBroker {
    pub fn new(pool: PgPool, channel_prefix: impl Into<String>) -> Self {
        Self {
            pool: Arc::new(pool),
            channel_prefix: channel_prefix.into(),
        }
    }

    /// Channel identifier for a correlation id, restricted to characters
    /// Postgres accepts in unquoted identifiers.
    pub fn channel_for(&self, correlation_id: &str) -> String {
        let sanitized: String = correlation_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}", self.channel_prefix, sanitized)
    }
}

#[async_trait]
impl ResponseBroker for PgResponseBroker {
    async fn deliver(&self, correlation_id: &str, response: &Value) -> Result<(), GatewayError> {
        let payload = serde_json::to_string(response)
            .map_err(|err| GatewayError::delivery(err.to_string()))?;
        if payload.len() > MAX_NOTIFY_PAYLOAD_BYTES {
            return Err(GatewayError::delivery(format!(
                "response payload of {} bytes exceeds the notify limit; caller falls back to the store",
                payload.len()
            )));
        }

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(self.channel_for(correlation_id))
            .bind(payload)
            .execute(self.pool.as_ref())
            .await
            .map_err(|err| GatewayError::delivery(err.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn broker() -> PgResponseBroker {
        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/wavecache");
        PgResponseBroker::new(pool.unwrap(), "wavecache_rsp")
    }

    #[tokio::test]
    async fn channel_names_are_valid_identifiers() {
        let broker = broker();
        assert_eq!(
            broker.channel_for("4AB7-90ff"),
            "wavecache_rsp_4ab7_90ff"
        );
        assert_eq!(
            broker.channel_for("weird id!"),
            "wavecache_rsp_weird_id_"
        );
    }
}
