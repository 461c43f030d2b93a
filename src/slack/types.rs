//! Typed views over Web API payloads.
//!
//! Payloads are archived verbatim, so these helpers only read the few fields
//! the ingestion engine keys on (`id`, `ts`, `thread_ts`).

use serde_json::Value;
use std::cmp::Ordering;

/// A message or reply as returned by `conversations.history`/`conversations.replies`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlackMessage {
    pub ts: String,
    pub thread_ts: Option<String>,
    pub data: Value,
}

impl SlackMessage {
    /// Wrap a raw payload; `None` when it lacks a string `ts`.
    pub fn from_value(data: Value) -> Option<Self> {
        let ts = data.get("ts")?.as_str()?.to_string();
        let thread_ts = data
            .get("thread_ts")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self { ts, thread_ts, data })
    }

    /// True when this payload is a reply inside someone else's thread.
    pub fn is_thread_reply(&self) -> bool {
        matches!(&self.thread_ts, Some(parent) if parent != &self.ts)
    }

    /// Timestamp of the thread root this message belongs to (its own `ts` for roots).
    pub fn parent_ts(&self) -> &str {
        match &self.thread_ts {
            Some(parent) if self.is_thread_reply() => parent,
            _ => &self.ts,
        }
    }
}

/// A user or channel directory entry, keyed by its `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub id: String,
    pub data: Value,
}

impl DirectoryEntry {
    pub fn from_value(data: Value) -> Option<Self> {
        let id = data.get("id")?.as_str()?.to_string();
        Some(Self { id, data })
    }
}

/// One page of `conversations.history`.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<SlackMessage>,
    pub has_more: bool,
    /// Payloads dropped because they carried no `ts`.
    pub skipped: usize,
}

impl HistoryPage {
    /// Oldest timestamp on the page, compared numerically.
    pub fn oldest_ts(&self) -> Option<&str> {
        self.messages
            .iter()
            .map(|message| message.ts.as_str())
            .min_by(|a, b| compare_ts(a, b))
    }
}

/// Split messages into well-formed entries and a count of malformed ones.
pub fn parse_messages(items: &[Value]) -> (Vec<SlackMessage>, usize) {
    let mut messages = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match SlackMessage::from_value(item.clone()) {
            Some(message) => messages.push(message),
            None => skipped += 1,
        }
    }
    (messages, skipped)
}

/// Order two `seconds.micros` timestamps numerically.
///
/// Falls back to string comparison for values that do not parse.
pub fn compare_ts(a: &str, b: &str) -> Ordering {
    match (ts_parts(a), ts_parts(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => a.cmp(b),
    }
}

fn ts_parts(ts: &str) -> Option<(u64, u64)> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    if frac.len() > 6 {
        return None;
    }
    let secs = secs.parse::<u64>().ok()?;
    // Right-pad so "1.5" and "1.500000" compare equal.
    let micros = format!("{:0<6}", frac).parse::<u64>().ok()?;
    Some((secs, micros))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_thread_replies() {
        let root = SlackMessage::from_value(json!({ "ts": "10.000001", "thread_ts": "10.000001" })).unwrap();
        let plain = SlackMessage::from_value(json!({ "ts": "11.000001" })).unwrap();
        let reply = SlackMessage::from_value(json!({ "ts": "12.000001", "thread_ts": "10.000001" })).unwrap();

        assert!(!root.is_thread_reply());
        assert!(!plain.is_thread_reply());
        assert!(reply.is_thread_reply());
        assert_eq!(root.parent_ts(), "10.000001");
        assert_eq!(plain.parent_ts(), "11.000001");
        assert_eq!(reply.parent_ts(), "10.000001");
    }

    #[test]
    fn rejects_payloads_without_keys() {
        assert!(SlackMessage::from_value(json!({ "text": "no ts" })).is_none());
        assert!(SlackMessage::from_value(json!({ "ts": 12 })).is_none());
        assert!(DirectoryEntry::from_value(json!({ "name": "general" })).is_none());

        let (messages, skipped) = parse_messages(&[json!({ "ts": "1.0" }), json!({})]);
        assert_eq!(messages.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn timestamps_compare_numerically() {
        assert_eq!(compare_ts("999.000001", "1000.000000"), Ordering::Less);
        assert_eq!(compare_ts("1681233252.5", "1681233252.500000"), Ordering::Equal);
        assert_eq!(compare_ts("1681233252.216899", "1681233252.216900"), Ordering::Less);
    }

    #[test]
    fn oldest_ts_ignores_response_order() {
        let (messages, _) = parse_messages(&[
            json!({ "ts": "1681233250.000300" }),
            json!({ "ts": "999.000000" }),
            json!({ "ts": "1681233251.000100" }),
        ]);
        let page = HistoryPage {
            messages,
            has_more: true,
            skipped: 0,
        };
        assert_eq!(page.oldest_ts(), Some("999.000000"));
        assert_eq!(HistoryPage::default().oldest_ts(), None);
    }
}
