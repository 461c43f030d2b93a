use chrono::Utc;
use serde_json::json;
use slack_archive::models::{Member, Message, Reply};
use slack_archive::slack::{DirectoryEntry, SlackMessage};
use slack_archive::sync::{ArchiveStore, PgArchiveStore};
use slack_archive::test_support::{TestDatabase, TestDatabaseError};

const CUTOFF: &str = "1681233252.216899";
const PARENT: &str = "1681000000.000100";

fn message(value: serde_json::Value) -> SlackMessage {
    SlackMessage::from_value(value).expect("message has ts")
}

fn entry(value: serde_json::Value) -> DirectoryEntry {
    DirectoryEntry::from_value(value).expect("entry has id")
}

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping archive store test: no container runtime ({err})");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

#[tokio::test]
async fn backfill_inserts_never_overwrite_existing_rows() {
    let Some(test_db) = provision().await else {
        return;
    };
    let store = PgArchiveStore::new(test_db.pool_clone());
    let now = Utc::now();

    let live = message(json!({ "ts": PARENT, "text": "edited live" }));
    store
        .upsert_live_message("C1", &live, now)
        .await
        .expect("live upsert");

    let stale = message(json!({ "ts": PARENT, "text": "original" }));
    let fresh = message(json!({ "ts": "1680000000.000100", "text": "older" }));
    let inserted = store
        .insert_messages("C1", &[stale.clone(), fresh.clone()], now)
        .await
        .expect("insert messages");
    assert_eq!(inserted, 1);

    let again = store
        .insert_messages("C1", &[stale, fresh], now)
        .await
        .expect("insert messages again");
    assert_eq!(again, 0);

    let kept: Message = sqlx::query_as("SELECT * FROM slack_messages WHERE ts = $1 AND channel = $2")
        .bind(PARENT)
        .bind("C1")
        .fetch_one(store.pool())
        .await
        .expect("message row");
    assert_eq!(kept.data["text"], "edited live");

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn replies_skip_the_parent_and_live_replies_route_to_reply_table() {
    let Some(test_db) = provision().await else {
        return;
    };
    let store = PgArchiveStore::new(test_db.pool_clone());
    let now = Utc::now();

    let root = message(json!({ "ts": PARENT, "thread_ts": PARENT }));
    let first = message(json!({ "ts": "1681000001.000100", "thread_ts": PARENT }));
    let inserted = store
        .insert_replies(PARENT, &[root, first], now)
        .await
        .expect("insert replies");
    assert_eq!(inserted, 1);

    let live_reply = message(json!({
        "ts": "1681000002.000100",
        "thread_ts": PARENT,
        "text": "live reply"
    }));
    store
        .upsert_live_message("C1", &live_reply, now)
        .await
        .expect("live reply upsert");

    let replies: Vec<Reply> = sqlx::query_as("SELECT * FROM slack_replies ORDER BY ts")
        .fetch_all(store.pool())
        .await
        .expect("reply rows");
    let ts: Vec<&str> = replies.iter().map(|reply| reply.ts.as_str()).collect();
    assert_eq!(ts, vec!["1681000001.000100", "1681000002.000100"]);
    assert!(replies.iter().all(|reply| reply.parent_ts == PARENT));

    let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM slack_messages")
        .fetch_one(store.pool())
        .await
        .expect("message count");
    assert_eq!(messages, 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn backfill_state_and_reply_queue_lifecycle() {
    let Some(test_db) = provision().await else {
        return;
    };
    let store = PgArchiveStore::new(test_db.pool_clone());
    let now = Utc::now();

    let channels = vec!["C2".to_string(), "C1".to_string()];
    assert_eq!(store.ensure_channel_backfill(&channels, CUTOFF).await.unwrap(), 2);
    store
        .advance_channel_backfill("C1", PARENT)
        .await
        .expect("advance");
    assert_eq!(store.ensure_channel_backfill(&channels, CUTOFF).await.unwrap(), 0);

    let pending = store.pending_channel_backfills().await.expect("pending");
    let cursors: Vec<(&str, &str)> = pending
        .iter()
        .map(|state| (state.channel.as_str(), state.cursor_ts.as_str()))
        .collect();
    assert_eq!(cursors, vec![("C1", PARENT), ("C2", CUTOFF)]);

    store
        .complete_channel_backfill("C2", now)
        .await
        .expect("complete");
    let pending = store.pending_channel_backfills().await.expect("pending");
    assert_eq!(pending.len(), 1);

    let parents = vec![PARENT.to_string(), "1680000000.000100".to_string()];
    assert_eq!(store.enqueue_reply_fetches("C1", &parents).await.unwrap(), 2);
    assert_eq!(store.enqueue_reply_fetches("C1", &parents).await.unwrap(), 0);

    store
        .complete_reply_fetch(PARENT, now)
        .await
        .expect("complete reply fetch");
    let queue = store.pending_reply_fetches().await.expect("queue");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].parent_ts, "1680000000.000100");
    assert_eq!(queue[0].channel, "C1");

    let progress = store.progress().await.expect("progress");
    assert_eq!(progress.channels_pending, 1);
    assert_eq!(progress.channels_completed, 1);
    assert_eq!(progress.reply_queue_pending, 1);
    assert_eq!(progress.reply_queue_completed, 1);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn directory_upsert_replaces_and_tolerates_duplicate_ids() {
    let Some(test_db) = provision().await else {
        return;
    };
    let store = PgArchiveStore::new(test_db.pool_clone());
    let now = Utc::now();

    let written = store
        .upsert_members(
            &[
                entry(json!({ "id": "U1", "name": "ada" })),
                entry(json!({ "id": "U1", "name": "ada lovelace" })),
                entry(json!({ "id": "U2", "name": "grace" })),
            ],
            now,
        )
        .await
        .expect("upsert members");
    assert_eq!(written, 2);

    store
        .upsert_members(&[entry(json!({ "id": "U2", "name": "grace hopper" }))], now)
        .await
        .expect("upsert again");

    let members: Vec<Member> = sqlx::query_as("SELECT * FROM slack_users ORDER BY id")
        .fetch_all(store.pool())
        .await
        .expect("member rows");
    let names: Vec<&str> = members
        .iter()
        .map(|member| member.data["name"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["ada lovelace", "grace hopper"]);

    test_db.close().await.expect("failed to drop test database");
}
