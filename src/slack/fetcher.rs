use super::error::SlackError;
use super::transport::{Sleeper, Transport};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Issues single Web API calls, waiting out rate limits.
///
/// A 429 suspends the caller for `cooldown` and replays the identical request;
/// there is no retry ceiling. Every other failure is classified and returned
/// after being logged, without retrying.
pub struct RateLimitedFetcher<T, S> {
    transport: T,
    sleeper: S,
    cooldown: Duration,
}

impl<T: Transport, S: Sleeper> RateLimitedFetcher<T, S> {
    pub fn new(transport: T, sleeper: S, cooldown: Duration) -> Self {
        Self {
            transport,
            sleeper,
            cooldown,
        }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Call `method` and return its JSON body when the remote reports `ok: true`.
    pub async fn fetch(&self, method: &str, query: &[(&str, String)]) -> Result<Value, SlackError> {
        loop {
            let response = match self.transport.get(method, query).await {
                Ok(response) => response,
                Err(err) => {
                    log::warn!("slack: {} request failed: {}", method, err);
                    return Err(err);
                }
            };

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                log::warn!(
                    "slack: rate limited on {}, retrying in {:?}",
                    method,
                    self.cooldown
                );
                self.sleeper.sleep(self.cooldown).await;
                continue;
            }

            if !response.status.is_success() {
                log::warn!(
                    "slack: {} returned status {}: {}",
                    method,
                    response.status,
                    response.body
                );
                return Err(SlackError::Status {
                    method: method.to_string(),
                    status: response.status,
                    body: response.body,
                });
            }

            let body: Value = match serde_json::from_str(&response.body) {
                Ok(body) => body,
                Err(source) => {
                    log::warn!("slack: {} returned an undecodable body: {}", method, source);
                    return Err(SlackError::Decode {
                        method: method.to_string(),
                        source,
                    });
                }
            };

            if body.get("ok").and_then(Value::as_bool) != Some(true) {
                let code = body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown_error")
                    .to_string();
                log::debug!("slack: {} reported error `{}`", method, code);
                return Err(SlackError::Api {
                    method: method.to_string(),
                    code,
                });
            }

            return Ok(body);
        }
    }
}
