use reqwest::StatusCode;
use thiserror::Error;

/// Remote error code returned when the bot user is not a member of the channel.
pub const NOT_IN_CHANNEL: &str = "not_in_channel";
/// Remote error code returned when a thread's parent message no longer exists.
pub const THREAD_NOT_FOUND: &str = "thread_not_found";

/// Failures while talking to the workspace Web API.
///
/// Rate limiting never shows up here: the fetcher waits it out.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} returned status {status}: {body}")]
    Status {
        method: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to decode {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{method} failed with error code `{code}`")]
    Api { method: String, code: String },
    #[error("{method} response is missing `{field}`")]
    MissingField { method: String, field: &'static str },
}

impl SlackError {
    /// Application-level error code, when the failure came from an `ok: false` body.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            SlackError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_not_in_channel(&self) -> bool {
        self.api_code() == Some(NOT_IN_CHANNEL)
    }

    pub fn is_thread_not_found(&self) -> bool {
        self.api_code() == Some(THREAD_NOT_FOUND)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
