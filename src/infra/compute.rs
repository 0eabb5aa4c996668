//! HTTP client for the physical compute engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::{
    application::gateways::{ComputeBackend, ComputeEnvelope, GatewayError},
    infra::error::InfraError,
};

/// Query flag telling the caching layer in front of the compute engine to
/// skip the cache, so a precompute replay never re-reads the very row being
/// recomputed.
const NOCACHE_PARAM: (&str, &str) = ("nocache", "true");

pub struct HttpComputeEngine {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpComputeEngine {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build compute client: {err}"))
            })?;

        let mut endpoint = endpoint;
        endpoint
            .query_pairs_mut()
            .append_pair(NOCACHE_PARAM.0, NOCACHE_PARAM.1);

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl ComputeBackend for HttpComputeEngine {
    async fn recompute(&self, request: &Value) -> Result<ComputeEnvelope, GatewayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    GatewayError::transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<ComputeEnvelope>()
            .await
            .map_err(|err| GatewayError::malformed(err.to_string()))
    }
}
