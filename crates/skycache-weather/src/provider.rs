//! Upstream weather fetcher for the Visual Crossing timeline API.
//!
//! Returns the raw response body; interpreting it is the codec's job.

use async_trait::async_trait;
use reqwest::Client;
use skycache_core::{ReqwestErrorExt, UnitGroup, UpstreamConfig};
use std::sync::Arc;
use tracing::instrument;

use crate::error::FetchError;

/// Performs one network call per invocation. No retries.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// Fetch the raw payload for an already-normalized, URL-encoded location.
    async fn fetch(&self, location: &str, api_key: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    unit: UnitGroup,
}

impl WeatherProvider {
    /// Build a provider whose requests are bounded by `config.timeout_secs`.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Unavailable(e.into_network_error()))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            unit: config.unit_group,
        })
    }

    fn timeline_url(&self, location: &str) -> String {
        format!("{}/{}", self.base_url, location)
    }
}

#[async_trait]
impl WeatherFetcher for WeatherProvider {
    #[instrument(skip(self, api_key), level = "info")]
    async fn fetch(&self, location: &str, api_key: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(self.timeline_url(location))
            .query(&[
                ("unitGroup", self.unit.as_str()),
                ("key", api_key),
                ("contentType", "json"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Unavailable(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Upstream returned status {}", status);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.without_url().to_string()))?;

        tracing::debug!("Upstream returned {} bytes", body.len());
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycache_core::NetworkError;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-api-key-123";

    fn provider_for(base_url: &str, unit: UnitGroup, timeout_secs: u64) -> WeatherProvider {
        let config = UpstreamConfig {
            api_key: API_KEY.to_string(),
            base_url: format!("{}/timeline", base_url),
            unit_group: unit,
            timeout_secs,
        };
        WeatherProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_raw_body() {
        let mock_server = MockServer::start().await;
        let body = r#"{"address":"paris","days":[]}"#;

        Mock::given(method("GET"))
            .and(path("/timeline/paris"))
            .and(query_param("unitGroup", "us"))
            .and(query_param("key", API_KEY))
            .and(query_param("contentType", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server.uri(), UnitGroup::Us, 10);
        let raw = provider.fetch("paris", API_KEY).await.unwrap();

        assert_eq!(raw, body.as_bytes());
    }

    #[tokio::test]
    async fn test_fetch_sends_configured_unit_group() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeline/oslo"))
            .and(query_param("unitGroup", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server.uri(), UnitGroup::Metric, 10);
        assert!(provider.fetch("oslo", API_KEY).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/timeline/atlantis"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Invalid location parameter value."),
            )
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server.uri(), UnitGroup::Us, 10);
        let err = provider.fetch("atlantis", API_KEY).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 400 }));
    }

    #[tokio::test]
    async fn test_rejected_key_is_not_echoed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server.uri(), UnitGroup::Us, 10);
        let err = provider.fetch("paris", API_KEY).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 401 }));
        assert!(!err.to_string().contains(API_KEY));
        assert!(!format!("{:?}", err).contains(API_KEY));
    }

    #[tokio::test]
    async fn test_connection_failure_does_not_leak_key() {
        // Port 1 is reserved and closed on test hosts
        let provider = provider_for("http://127.0.0.1:1", UnitGroup::Us, 5);
        let err = provider.fetch("paris", API_KEY).await.unwrap_err();

        assert!(matches!(err, FetchError::Unavailable(_)));
        assert!(!err.to_string().contains(API_KEY));
        assert!(!format!("{:?}", err).contains(API_KEY));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let provider = provider_for(&mock_server.uri(), UnitGroup::Us, 1);
        let err = provider.fetch("paris", API_KEY).await.unwrap_err();

        assert!(matches!(err, FetchError::Unavailable(NetworkError::Timeout)));
    }
}
