//! Per-pass ingestion statistics.
//!
//! Each job returns a report so the scheduler can log one summary line per
//! pass and tests can assert on what a pass did.

use std::fmt;

/// Outcome of one directory refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryReport {
    /// Whether the member list was due and fetched this pass.
    pub members_refreshed: bool,
    /// Member rows written (inserted or updated)
    pub members: u64,
    pub channels_refreshed: bool,
    /// Channel rows written (inserted or updated)
    pub channels: u64,
    /// Backfill states created for newly seen channels
    pub backfills_seeded: u64,
    /// Listings that stopped early on a fetch failure
    pub interrupted: usize,
}

/// Outcome of one sweep over pending channel backfills.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelBackfillReport {
    pub channels_visited: usize,
    pub channels_completed: usize,
    pub channels_failed: usize,
    /// Channels whose page could not move the cursor
    pub channels_stalled: usize,
    pub messages_inserted: u64,
    pub replies_inserted: u64,
    pub parents_enqueued: u64,
    pub joins: usize,
}

/// Outcome of one drain of the reply-fetch queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyBackfillReport {
    pub threads_completed: usize,
    /// Entries closed because the thread no longer exists
    pub threads_missing: usize,
    pub replies_inserted: u64,
    pub joins: usize,
    /// Set when a failure stopped the drain early.
    pub aborted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub directory: DirectoryReport,
    pub channels: ChannelBackfillReport,
    pub replies: ReplyBackfillReport,
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "members {} channels {} seeded {} | channels visited {} completed {} failed {} stalled {} messages {} parents {} | threads {} missing {} replies {}{}",
            self.directory.members,
            self.directory.channels,
            self.directory.backfills_seeded,
            self.channels.channels_visited,
            self.channels.channels_completed,
            self.channels.channels_failed,
            self.channels.channels_stalled,
            self.channels.messages_inserted,
            self.channels.parents_enqueued,
            self.replies.threads_completed,
            self.replies.threads_missing,
            self.channels.replies_inserted + self.replies.replies_inserted,
            if self.replies.aborted { " (reply drain aborted)" } else { "" }
        )
    }
}
