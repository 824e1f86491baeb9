//! Match Result Persistence
//!
//! The server hands each finished match's record to a [`ResultSink`]
//! exactly once, after the end-of-match broadcast. Cancelled matches
//! produce no record. The default sink just logs; deployments wire in
//! their own (database, message queue) behind the same trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// The immutable record of one finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Match id.
    pub match_id: Uuid,
    /// Player 1's user id.
    pub player1_id: String,
    /// Player 2's user id.
    pub player2_id: String,
    /// Player 1's final points.
    pub score1: u32,
    /// Player 2's final points.
    pub score2: u32,
    /// User id of the winner.
    pub winner_id: String,
    /// Seconds between activation and the finishing tick.
    pub duration_seconds: u64,
    /// When the match finished.
    pub finished_at: DateTime<Utc>,
}

/// Destination for finished-match records.
///
/// `record` must not block the tick loop; implementations that persist
/// remotely should enqueue and return.
pub trait ResultSink: Send + Sync {
    /// Accept one finished match's record.
    fn record(&self, record: MatchRecord);
}

/// Sink that emits each record as a structured log line.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl ResultSink for LoggingSink {
    fn record(&self, record: MatchRecord) {
        info!(
            match_id = %record.match_id,
            winner = %record.winner_id,
            score = format!("{}-{}", record.score1, record.score2),
            duration_seconds = record.duration_seconds,
            "match result recorded"
        );
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: std::sync::Mutex<Vec<MatchRecord>>,
}

impl MemorySink {
    /// All records received so far.
    pub fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ResultSink for MemorySink {
    fn record(&self, record: MatchRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
