//! Optional ruleset/configuration directory lookup.
//!
//! Feeds the spatial-invalidation radius policy. The collaborator is
//! optional by design; any failure here degrades to the configured default
//! radius rather than blocking invalidation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{
    application::gateways::{GatewayError, RulesetDirectory},
    infra::error::InfraError,
};

const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct DirectoryReply {
    invalidation_radius_km: Option<f64>,
}

pub struct HttpRulesetDirectory {
    client: Client,
    endpoint: Url,
}

impl HttpRulesetDirectory {
    pub fn new(endpoint: Url) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(DIRECTORY_TIMEOUT)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build directory client: {err}"))
            })?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RulesetDirectory for HttpRulesetDirectory {
    async fn invalidation_radius_km(&self) -> Result<Option<f64>, GatewayError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|err| GatewayError::transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
            });
        }

        let reply = response
            .json::<DirectoryReply>()
            .await
            .map_err(|err| GatewayError::malformed(err.to_string()))?;

        Ok(reply.invalidation_radius_km.filter(|r| r.is_finite() && *r > 0.0))
    }
}
