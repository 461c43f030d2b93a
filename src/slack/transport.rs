//! Raw HTTP access to Web API methods.
//!
//! [`Transport`] is the seam between the ingestion engine and the network: the
//! production implementation issues authenticated GETs with `reqwest`, tests
//! substitute scripted responses.

use super::config::SlackConfig;
use super::error::{ConfigError, SlackError};
use reqwest::StatusCode;
use std::time::Duration;

/// Status and undecoded body of a single Web API call.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

#[rocket::async_trait]
pub trait Transport: Send + Sync {
    /// Issue `GET {base}/{method}?{query}` once. No retries.
    async fn get(&self, method: &str, query: &[(&str, String)]) -> Result<RawResponse, SlackError>;
}

/// Blocking wait used for the rate-limit cooldown and the inter-pass interval.
#[rocket::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[rocket::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ReqwestTransport {
    pub fn new(config: &SlackConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("slack-archive/0.1")
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }
}

#[rocket::async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, method: &str, query: &[(&str, String)]) -> Result<RawResponse, SlackError> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}
