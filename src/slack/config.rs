use super::error::ConfigError;
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

/// Parse an unsigned integer setting, falling back to `default` when unset or malformed.
pub(crate) fn lookup_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn lookup_string<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Connection and paging settings for the workspace Web API.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub token: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub rate_limit_cooldown: Duration,
    pub directory_page_limit: u32,
    pub history_page_limit: u32,
    pub replies_limit: u32,
}

impl SlackConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `SLACK_TOKEN` is the only required setting; everything else has a default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("SLACK_TOKEN")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing("SLACK_TOKEN"))?;

        let base_url = lookup_string(&lookup, "SLACK_API_BASE_URL", DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            token,
            base_url,
            request_timeout: Duration::from_millis(lookup_u64(
                &lookup,
                "ARCHIVE_HTTP_TIMEOUT_MS",
                30_000,
            )),
            rate_limit_cooldown: Duration::from_secs(lookup_u64(
                &lookup,
                "ARCHIVE_RATE_LIMIT_COOLDOWN_SECS",
                30,
            )),
            directory_page_limit: page_limit(&lookup, "ARCHIVE_DIRECTORY_PAGE_LIMIT", 200, 1),
            // History is fetched inclusively; a one-message page could never move the cursor.
            history_page_limit: page_limit(&lookup, "ARCHIVE_HISTORY_PAGE_LIMIT", 500, 2),
            replies_limit: page_limit(&lookup, "ARCHIVE_REPLIES_LIMIT", 999, 1),
        })
    }
}

fn page_limit<F>(lookup: &F, key: &str, default: u32, min: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup_u64(lookup, key, u64::from(default));
    u32::try_from(value).unwrap_or(default).max(min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn token_is_required() {
        let err = SlackConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SLACK_TOKEN")));

        let blank = SlackConfig::from_lookup(lookup_from(&[("SLACK_TOKEN", "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn defaults_match_remote_limits() {
        let config = SlackConfig::from_lookup(lookup_from(&[("SLACK_TOKEN", "xoxb-1")])).unwrap();
        assert_eq!(config.token, "xoxb-1");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.rate_limit_cooldown, Duration::from_secs(30));
        assert_eq!(config.directory_page_limit, 200);
        assert_eq!(config.history_page_limit, 500);
        assert_eq!(config.replies_limit, 999);
    }

    #[test]
    fn overrides_are_parsed_and_malformed_values_fall_back() {
        let config = SlackConfig::from_lookup(lookup_from(&[
            ("SLACK_TOKEN", "xoxb-1"),
            ("SLACK_API_BASE_URL", "http://127.0.0.1:9000/api/"),
            ("ARCHIVE_RATE_LIMIT_COOLDOWN_SECS", "5"),
            ("ARCHIVE_HISTORY_PAGE_LIMIT", "not-a-number"),
            ("ARCHIVE_REPLIES_LIMIT", "0"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.rate_limit_cooldown, Duration::from_secs(5));
        assert_eq!(config.history_page_limit, 500);
        assert_eq!(config.replies_limit, 1);
    }

    #[test]
    fn history_pages_hold_at_least_two_messages() {
        let config = SlackConfig::from_lookup(lookup_from(&[
            ("SLACK_TOKEN", "xoxb-1"),
            ("ARCHIVE_HISTORY_PAGE_LIMIT", "1"),
            ("ARCHIVE_DIRECTORY_PAGE_LIMIT", "1"),
        ]))
        .unwrap();

        assert_eq!(config.history_page_limit, 2);
        assert_eq!(config.directory_page_limit, 1);
    }
}
