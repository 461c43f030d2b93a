use super::error::SlackError;
use super::fetcher::RateLimitedFetcher;
use super::transport::{Sleeper, Transport};
use serde_json::Value;

/// Items gathered from a cursor-paginated listing.
///
/// `interrupted` is set when a page failed terminally; `items` then holds
/// everything collected before the failure.
#[derive(Debug, Default)]
pub struct Collected {
    pub items: Vec<Value>,
    pub pages: usize,
    pub interrupted: Option<SlackError>,
}

impl Collected {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Continuation cursor of a page, treating the empty string as "no more pages".
pub fn next_cursor(body: &Value) -> Option<String> {
    body.pointer("/response_metadata/next_cursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

impl<T: Transport, S: Sleeper> RateLimitedFetcher<T, S> {
    /// Walk every page of a list method, appending each page's `item_field`
    /// array in page order.
    pub async fn pull_all(
        &self,
        method: &str,
        item_field: &str,
        base_query: &[(&str, String)],
        start_cursor: Option<String>,
    ) -> Collected {
        let mut collected = Collected::default();
        let mut cursor = start_cursor;

        loop {
            let mut query = base_query.to_vec();
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }

            let body = match self.fetch(method, &query).await {
                Ok(body) => body,
                Err(err) => {
                    log::warn!(
                        "slack: {} listing stopped after {} pages: {}",
                        method,
                        collected.pages,
                        err
                    );
                    collected.interrupted = Some(err);
                    break;
                }
            };

            collected.pages += 1;
            if let Some(Value::Array(items)) = body.get(item_field) {
                collected.items.extend(items.iter().cloned());
            }

            cursor = next_cursor(&body);
            if cursor.is_none() {
                break;
            }
        }

        log::debug!(
            "slack: {} returned {} items over {} pages",
            method,
            collected.items.len(),
            collected.pages
        );
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::super::fetcher::testing::{RecordingSleeper, ScriptedTransport};
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn ids(collected: &Collected) -> Vec<&str> {
        collected
            .items
            .iter()
            .filter_map(|item| item["id"].as_str())
            .collect()
    }

    fn fetcher(transport: &ScriptedTransport) -> RateLimitedFetcher<ScriptedTransport, RecordingSleeper> {
        RateLimitedFetcher::new(
            transport.clone(),
            RecordingSleeper::default(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn concatenates_pages_in_order() {
        let transport = ScriptedTransport::new();
        transport
            .ok(
                "users.list",
                json!({
                    "members": [{ "id": "U1" }, { "id": "U2" }],
                    "response_metadata": { "next_cursor": "page2" }
                }),
            )
            .ok(
                "users.list",
                json!({
                    "members": [{ "id": "U3" }],
                    "response_metadata": { "next_cursor": "page3" }
                }),
            )
            .ok(
                "users.list",
                json!({
                    "members": [{ "id": "U4" }, { "id": "U5" }],
                    "response_metadata": { "next_cursor": "" }
                }),
            );

        let collected = fetcher(&transport)
            .pull_all("users.list", "members", &[("limit", "2".to_string())], None)
            .await;

        assert!(collected.is_complete());
        assert_eq!(collected.pages, 3);
        assert_eq!(ids(&collected), vec!["U1", "U2", "U3", "U4", "U5"]);

        let calls = transport.calls_to("users.list");
        assert_eq!(calls[0].param("cursor"), None);
        assert_eq!(calls[1].param("cursor"), Some("page2"));
        assert_eq!(calls[2].param("cursor"), Some("page3"));
        assert!(calls.iter().all(|call| call.param("limit") == Some("2")));
    }

    #[tokio::test]
    async fn starts_from_a_supplied_cursor() {
        let transport = ScriptedTransport::new();
        transport.ok("conversations.list", json!({ "channels": [{ "id": "C9" }] }));

        let collected = fetcher(&transport)
            .pull_all("conversations.list", "channels", &[], Some("resume".to_string()))
            .await;

        assert_eq!(ids(&collected), vec!["C9"]);
        assert_eq!(
            transport.calls_to("conversations.list")[0].param("cursor"),
            Some("resume")
        );
    }

    #[tokio::test]
    async fn a_failed_page_keeps_earlier_items_and_reports_the_failure() {
        let transport = ScriptedTransport::new();
        transport
            .ok(
                "users.list",
                json!({
                    "members": [{ "id": "U1" }],
                    "response_metadata": { "next_cursor": "page2" }
                }),
            )
            .push("users.list", 500, json!({}));

        let collected = fetcher(&transport)
            .pull_all("users.list", "members", &[], None)
            .await;

        assert!(!collected.is_complete());
        assert_eq!(collected.pages, 1);
        assert_eq!(ids(&collected), vec!["U1"]);
    }

    #[test]
    fn empty_cursor_means_last_page() {
        assert_eq!(next_cursor(&json!({ "response_metadata": { "next_cursor": "" } })), None);
        assert_eq!(next_cursor(&json!({})), None);
        assert_eq!(
            next_cursor(&json!({ "response_metadata": { "next_cursor": "dXNlcjpVMDYx" } })),
            Some("dXNlcjpVMDYx".to_string())
        );
    }
}
