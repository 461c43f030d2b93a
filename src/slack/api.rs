use super::config::SlackConfig;
use super::error::{ConfigError, SlackError};
use super::fetcher::RateLimitedFetcher;
use super::pager::Collected;
use super::transport::{ReqwestTransport, Sleeper, TokioSleeper, Transport};
use super::types::{HistoryPage, SlackMessage, parse_messages};
use serde_json::Value;
use std::future::Future;

/// Result of a call that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    /// The remote reported a benign "nothing here" code.
    Missing,
}

/// Typed access to the Web API methods the archiver consumes.
pub struct SlackApi<T, S> {
    fetcher: RateLimitedFetcher<T, S>,
    directory_page_limit: u32,
    history_page_limit: u32,
    replies_limit: u32,
}

impl SlackApi<ReqwestTransport, TokioSleeper> {
    pub fn from_config(config: &SlackConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(transport, TokioSleeper, config))
    }
}

impl<T: Transport, S: Sleeper> SlackApi<T, S> {
    pub fn new(transport: T, sleeper: S, config: &SlackConfig) -> Self {
        Self {
            fetcher: RateLimitedFetcher::new(transport, sleeper, config.rate_limit_cooldown),
            directory_page_limit: config.directory_page_limit,
            history_page_limit: config.history_page_limit,
            replies_limit: config.replies_limit,
        }
    }

    pub fn sleeper(&self) -> &S {
        self.fetcher.sleeper()
    }

    pub async fn list_members(&self) -> Collected {
        let query = [("limit", self.directory_page_limit.to_string())];
        self.fetcher
            .pull_all("users.list", "members", &query, None)
            .await
    }

    pub async fn list_channels(&self) -> Collected {
        let query = [("limit", self.directory_page_limit.to_string())];
        self.fetcher
            .pull_all("conversations.list", "channels", &query, None)
            .await
    }

    /// One page of history at or before `latest`, newest first.
    pub async fn channel_history(
        &self,
        channel: &str,
        latest: &str,
    ) -> Result<HistoryPage, SlackError> {
        let query = [
            ("channel", channel.to_string()),
            ("latest", latest.to_string()),
            ("inclusive", "true".to_string()),
            ("limit", self.history_page_limit.to_string()),
        ];
        let body = self.fetcher.fetch("conversations.history", &query).await?;

        let items = body
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| SlackError::MissingField {
                method: "conversations.history".to_string(),
                field: "messages",
            })?;
        let (messages, skipped) = parse_messages(items);

        Ok(HistoryPage {
            messages,
            has_more: body.get("has_more").and_then(Value::as_bool).unwrap_or(false),
            skipped,
        })
    }

    /// Every message of the thread rooted at `parent_ts`, the root included.
    ///
    /// A deleted thread (`thread_not_found`) is reported as [`Fetched::Missing`].
    pub async fn thread_replies(
        &self,
        channel: &str,
        parent_ts: &str,
    ) -> Result<Fetched<Vec<SlackMessage>>, SlackError> {
        let query = [
            ("channel", channel.to_string()),
            ("ts", parent_ts.to_string()),
            ("limit", self.replies_limit.to_string()),
        ];
        let body = match self.fetcher.fetch("conversations.replies", &query).await {
            Ok(body) => body,
            Err(err) if err.is_thread_not_found() => return Ok(Fetched::Missing),
            Err(err) => return Err(err),
        };

        let items = body
            .get("messages")
            .and_then(Value::as_array)
            .ok_or_else(|| SlackError::MissingField {
                method: "conversations.replies".to_string(),
                field: "messages",
            })?;
        let (messages, skipped) = parse_messages(items);
        if skipped > 0 {
            log::warn!(
                "slack: dropped {} replies without ts under {}",
                skipped,
                parent_ts
            );
        }

        Ok(Fetched::Data(messages))
    }

    /// Run `call`; on `not_in_channel` join `channel` and run it exactly once
    /// more. The retry's outcome is final. `joins` counts join attempts.
    pub async fn with_membership<R, F, Fut>(
        &self,
        channel: &str,
        joins: &mut usize,
        call: F,
    ) -> Result<R, SlackError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R, SlackError>>,
    {
        match call().await {
            Err(err) if err.is_not_in_channel() => {
                log::info!("slack: joining channel {}", channel);
                *joins += 1;
                self.join_channel(channel).await?;
                call().await
            }
            other => other,
        }
    }

    pub async fn join_channel(&self, channel: &str) -> Result<(), SlackError> {
        let query = [("channel", channel.to_string())];
        self.fetcher.fetch("conversations.join", &query).await?;
        Ok(())
    }
}
