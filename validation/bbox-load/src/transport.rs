//! Request transport for the bbox query endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::ScenarioConfig;
use crate::error::LoadResult;

/// Raw response: status and fully read body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Anything that can issue a bbox query and return the raw response.
///
/// Implementations must be shareable across virtual users.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Issue one query. `bbox` is the already formatted `minX,minY,maxX,maxY`.
    ///
    /// Returns once the body has been read, so the caller's timing covers
    /// the whole exchange.
    async fn fetch(&self, bbox: &str) -> LoadResult<TransportResponse>;
}

/// HTTP GET transport backed by a pooled reqwest client.
pub struct HttpTransport {
    client: Client,
    endpoint_url: String,
}

impl HttpTransport {
    /// Build a transport for `endpoint_url`. No timeout unless one is given.
    pub fn new(
        endpoint_url: impl Into<String>,
        timeout: Option<Duration>,
        max_idle_per_host: usize,
    ) -> LoadResult<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(max_idle_per_host);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint_url: endpoint_url.into(),
        })
    }

    /// Transport for a scenario, with one idle connection slot per user.
    pub fn from_config(config: &ScenarioConfig) -> LoadResult<Self> {
        Self::new(
            config.endpoint_url(),
            config.request_timeout_secs.map(Duration::from_secs),
            config.target_concurrency as usize,
        )
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    fn build_request(&self, bbox: &str) -> LoadResult<reqwest::Request> {
        Ok(self
            .client
            .get(&self.endpoint_url)
            .query(&[("bbox", bbox)])
            .build()?)
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn fetch(&self, bbox: &str) -> LoadResult<TransportResponse> {
        let request = self.build_request(bbox)?;
        debug!(url = %request.url(), "Sending query");

        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}
