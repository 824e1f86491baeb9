//! Match Registry
//!
//! The server-wide concurrent map of live matches. Creation, lookup,
//! join admission, discovery and idle eviction all go through here.
//! Sessions are shared as `Arc<RwLock<MatchSession>>`: the registry map
//! lock is held only for map operations, never across a tick.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::rng::MatchRng;
use crate::game::state::{GameConfig, MatchStatus, PlayerNumber, MAX_MAX_SCORE, MIN_MAX_SCORE};
use crate::network::auth::Identity;
use crate::network::protocol::MatchSummary;
use crate::network::session::{MatchSession, SessionError};

/// Registry errors.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// No match with that id.
    #[error("match not found")]
    NotFound,

    /// Match is not accepting joins.
    #[error("match is not joinable")]
    NotJoinable,

    /// Both slots already bound.
    #[error("match is full")]
    Full,

    /// Caller already holds a slot in that match.
    #[error("already joined this match")]
    AlreadyJoined,

    /// Winning score outside `[1, 21]`.
    #[error("winning score must be between {MIN_MAX_SCORE} and {MAX_MAX_SCORE}")]
    InvalidMaxScore,

    /// Registry at capacity.
    #[error("server is at match capacity")]
    Exhausted,
}

impl From<SessionError> for RegistryError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotJoinable => RegistryError::NotJoinable,
            SessionError::Full => RegistryError::Full,
            SessionError::AlreadyJoined => RegistryError::AlreadyJoined,
            // Attach-phase errors never surface through join
            SessionError::NoSlot | SessionError::AlreadyAttached => RegistryError::NotJoinable,
        }
    }
}

/// Admission and retention policy for the registry.
#[derive(Clone, Debug)]
pub struct RegistryPolicy {
    /// Hard cap on concurrent matches.
    pub max_matches: usize,
    /// Age after which a `Waiting` match is evicted.
    pub idle_after: Duration,
    /// Ticks a disconnected player may stay dark before cancellation.
    pub reconnect_grace_ticks: u32,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            max_matches: 1000,
            idle_after: Duration::seconds(300),
            reconnect_grace_ticks: 30 * crate::TICK_RATE,
        }
    }
}

/// Shared handle to one live session.
pub type SharedSession = Arc<RwLock<MatchSession>>;

/// The concurrent match registry.
pub struct MatchRegistry {
    matches: RwLock<HashMap<Uuid, SharedSession>>,
    policy: RegistryPolicy,
}

impl MatchRegistry {
    /// Create an empty registry with the given policy.
    pub fn new(policy: RegistryPolicy) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Create a match with `creator` bound as player 1.
    ///
    /// `max_score` defaults to [`crate::DEFAULT_MAX_SCORE`] and must fall
    /// in `[MIN_MAX_SCORE, MAX_MAX_SCORE]`.
    pub async fn create(
        &self,
        creator: Identity,
        max_score: Option<u32>,
    ) -> Result<(Uuid, SharedSession), RegistryError> {
        let max_score = max_score.unwrap_or(crate::DEFAULT_MAX_SCORE);
        if !(MIN_MAX_SCORE..=MAX_MAX_SCORE).contains(&max_score) {
            return Err(RegistryError::InvalidMaxScore);
        }

        let mut matches = self.matches.write().await;
        if matches.len() >= self.policy.max_matches {
            warn!(count = matches.len(), "match registry at capacity");
            return Err(RegistryError::Exhausted);
        }

        let id = Uuid::new_v4();
        let session = MatchSession::new(
            id,
            GameConfig::with_max_score(max_score),
            MatchRng::seed_from_entropy(),
            self.policy.reconnect_grace_ticks,
            creator,
        );
        let shared = Arc::new(RwLock::new(session));
        matches.insert(id, Arc::clone(&shared));

        info!(match_id = %id, max_score, "match created");
        Ok((id, shared))
    }

    /// Look up a session by id.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.matches.read().await.get(&id).cloned()
    }

    /// Reserve the second slot of a waiting match for `identity`.
    ///
    /// The admission check runs under the session's write lock, so two
    /// concurrent joins serialize and exactly one wins the slot.
    pub async fn join(
        &self,
        id: Uuid,
        identity: Identity,
    ) -> Result<(PlayerNumber, SharedSession), RegistryError> {
        let shared = self.get(id).await.ok_or(RegistryError::NotFound)?;

        let number = {
            let mut session = shared.write().await;
            session.bind_opponent(identity)?
        };

        info!(match_id = %id, player = %number, "player joined match");
        Ok((number, shared))
    }

    /// Summaries of matches still waiting for an opponent.
    pub async fn list_waiting(&self) -> Vec<MatchSummary> {
        let matches = self.matches.read().await;
        let mut summaries = Vec::new();
        for shared in matches.values() {
            let session = shared.read().await;
            if session.status() == MatchStatus::Waiting {
                summaries.push(session.summary());
            }
        }
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    /// Evict `Waiting` matches older than the idle threshold.
    ///
    /// Each evicted session is cancelled before removal, so a connection
    /// holding a stale handle observes the terminal state rather than a
    /// silently live match. Returns the number evicted.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.policy.idle_after;

        let mut stale = Vec::new();
        {
            let matches = self.matches.read().await;
            for (id, shared) in matches.iter() {
                let session = shared.read().await;
                if session.status() == MatchStatus::Waiting && session.created_at() < cutoff {
                    stale.push(*id);
                }
            }
        }

        let mut evicted = 0;
        for id in stale {
            if let Some(shared) = self.get(id).await {
                let mut session = shared.write().await;
                // Re-check under the write lock; the match may have
                // activated since the scan
                if session.status() == MatchStatus::Waiting && session.created_at() < cutoff {
                    session.cancel();
                    drop(session);
                    self.matches.write().await.remove(&id);
                    debug!(match_id = %id, "evicted idle match");
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            info!(evicted, "idle match eviction pass complete");
        }
        evicted
    }

    /// Remove a match from the registry.
    pub async fn delete(&self, id: Uuid) -> bool {
        self.matches.write().await.remove(&id).is_some()
    }

    /// Number of live matches.
    pub async fn count(&self) -> usize {
        self.matches.read().await.len()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new(RegistryPolicy::default())
    }
}
