//! HTTP client for the wavecache administrative API.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;
use wavecache_api_types::{
    InvalidateRequest, InvalidateResponse, QuotaRequest, QuotaResponse, StatusResponse,
    SwitchKind, SwitchResponse,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid endpoint path: {0}")]
    Path(String),
    #[error("server returned {status}: {body}")]
    Server { status: StatusCode, body: String },
}

pub struct AdminClient {
    http: Client,
    base: Url,
}

impl AdminClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: Client::new(),
            base,
        }
    }

    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        let response = self.http.get(self.endpoint("status")?).send().await?;
        Self::parse(response).await
    }

    pub async fn set_switch(
        &self,
        switch: SwitchKind,
        enabled: bool,
    ) -> Result<SwitchResponse, ClientError> {
        let action = if enabled { "enable" } else { "disable" };
        let path = format!("{}/{}", switch.as_str(), action);
        let response = self.http.post(self.endpoint(&path)?).send().await?;
        Self::parse(response).await
    }

    pub async fn set_quota(&self, quota: u32) -> Result<QuotaResponse, ClientError> {
        let response = self
            .http
            .put(self.endpoint("precompute/quota")?)
            .json(&QuotaRequest { quota })
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn invalidate(
        &self,
        request: &InvalidateRequest,
    ) -> Result<InvalidateResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoint("invalidate")?)
            .json(request)
            .send()
            .await?;
        Self::parse(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ClientError::Path("base url cannot have segments".to_string()))?;
            segments.pop_if_empty();
            for segment in path.split('/') {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server { status, body });
        }
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> AdminClient {
        AdminClient::new(Url::parse(&server.base_url()).unwrap())
    }

    #[tokio::test]
    async fn status_round_trips() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(200).json_body(json!({
                    "switches": {"update": true, "invalidate": false, "precompute": true},
                    "precompute": {"quota": 4, "in_flight": 2},
                    "entries": {"valid": 10, "invalid": 3, "precomputing": 2},
                }));
            })
            .await;

        let status = client(&server).status().await.unwrap();
        mock.assert_async().await;
        assert!(!status.switches.invalidate);
        assert_eq!(status.precompute.quota, 4);
        assert_eq!(status.entries.invalid, 3);
    }

    #[tokio::test]
    async fn switch_writes_hit_the_expected_route() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/precompute/disable");
                then.status(200)
                    .json_body(json!({"switch": "precompute", "enabled": false}));
            })
            .await;

        let response = client(&server)
            .set_switch(SwitchKind::Precompute, false)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(response.switch, SwitchKind::Precompute);
        assert!(!response.enabled);
    }

    #[tokio::test]
    async fn quota_is_put_as_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/precompute/quota")
                    .json_body(json!({"quota": 9}));
                then.status(200).json_body(json!({"quota": 9}));
            })
            .await;

        let response = client(&server).set_quota(9).await.unwrap();
        mock.assert_async().await;
        assert_eq!(response.quota, 9);
    }

    #[tokio::test]
    async fn server_errors_surface_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/precompute/quota");
                then.status(400)
                    .json_body(json!({"error": {"code": "bad_request", "message": "invalid quota"}}));
            })
            .await;

        let error = client(&server).set_quota(0).await.unwrap_err();
        match error {
            ClientError::Server { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(body.contains("invalid quota"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
