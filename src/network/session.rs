//! Match Session
//!
//! One live match: the authoritative game state, the two player slots,
//! and the lifecycle state machine. The session owns the only mutable
//! copy of its physics state; gateways submit commands through the
//! methods here and relay the broadcasts back out. The per-match tick
//! loop in `server.rs` drives [`MatchSession::run_tick`].

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::rng::MatchRng;
use crate::game::events::GameEvent;
use crate::game::state::{GameConfig, GameState, MatchStatus, PlayerNumber};
use crate::game::tick::{self, PaddleDirection};
use crate::network::auth::Identity;
use crate::network::protocol::{MatchSummary, RosterEntry, ServerMessage};
use crate::network::sink::MatchRecord;

/// The binding of one participant to a side of the field.
///
/// A slot survives transport loss: `connected` flips to false and the
/// holder may re-attach while the match is not terminal.
#[derive(Debug)]
pub struct PlayerSlot {
    /// Stable external user id.
    pub user_id: String,
    /// Name shown to the opponent.
    pub display_name: String,
    /// Side assigned at join time, never reassigned.
    pub number: PlayerNumber,
    /// Whether a push connection is currently live.
    pub connected: bool,
    /// Outbound channel to the live connection.
    sender: Option<mpsc::Sender<ServerMessage>>,
}

impl PlayerSlot {
    fn new(identity: Identity, number: PlayerNumber) -> Self {
        Self {
            user_id: identity.user_id,
            display_name: identity.display_name,
            number,
            connected: false,
            sender: None,
        }
    }
}

/// Outcome of attaching a push connection to a slot.
#[derive(Debug)]
pub struct AttachOutcome {
    /// Side the connection was bound to.
    pub player_number: PlayerNumber,
    /// True until the opponent's connection is live too.
    pub waiting_for_opponent: bool,
    /// True exactly once: the attach that completed the pair and moved
    /// the match from `Waiting` to `Active`.
    pub activated: bool,
    /// True when this attach was a reconnection into a running match.
    pub reconnected: bool,
}

/// Result of one driver tick of the session.
#[derive(Debug, Default)]
pub struct SessionTick {
    /// Simulation events, in causal order.
    pub events: Vec<GameEvent>,
    /// State snapshot to broadcast; absent while suspended, paused, or
    /// on the finishing tick (nothing follows the end event).
    pub snapshot: Option<GameState>,
    /// Match finished this tick.
    pub finished: bool,
    /// Reconnection grace expired this tick; match cancelled.
    pub cancelled: bool,
}

/// Session errors (admission failures; they never corrupt state).
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Match is not accepting joins.
    #[error("match is not joinable")]
    NotJoinable,

    /// Both slots already bound.
    #[error("match is full")]
    Full,

    /// Caller already holds a slot.
    #[error("already joined this match")]
    AlreadyJoined,

    /// Caller holds no slot in this match.
    #[error("no slot reserved in this match")]
    NoSlot,

    /// Caller's slot already has a live connection.
    #[error("slot already has a live connection")]
    AlreadyAttached,
}

/// A match session.
pub struct MatchSession {
    /// Unique match identifier, assigned at creation.
    pub id: Uuid,
    status: MatchStatus,
    config: GameConfig,
    game: GameState,
    rng: MatchRng,
    /// Slots in arrival order; index 0 is player 1.
    slots: Vec<PlayerSlot>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    /// Ticks a disconnected slot may stay dark before cancellation.
    reconnect_grace_ticks: u32,
    grace_ticks_left: Option<u32>,
}

impl MatchSession {
    /// Create a new session in `Waiting` with the creator bound as
    /// player 1 (not yet connected).
    pub fn new(
        id: Uuid,
        config: GameConfig,
        seed: u64,
        reconnect_grace_ticks: u32,
        creator: Identity,
    ) -> Self {
        let game = GameState::new(&config);

        Self {
            id,
            status: MatchStatus::Waiting,
            config,
            game,
            rng: MatchRng::new(seed),
            slots: vec![PlayerSlot::new(creator, PlayerNumber::One)],
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            reconnect_grace_ticks,
            grace_ticks_left: None,
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Creation time, used for idle eviction.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Clone of the current physics state.
    pub fn snapshot(&self) -> GameState {
        self.game.clone()
    }

    /// Slot held by a user, if any.
    pub fn slot(&self, user_id: &str) -> Option<&PlayerSlot> {
        self.slots.iter().find(|s| s.user_id == user_id)
    }

    fn slot_mut(&mut self, user_id: &str) -> Option<&mut PlayerSlot> {
        self.slots.iter_mut().find(|s| s.user_id == user_id)
    }

    /// Count of slots with a live connection.
    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.connected).count()
    }

    fn both_connected(&self) -> bool {
        self.slots.len() == 2 && self.slots.iter().all(|s| s.connected)
    }

    /// Roster of bound participants.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.slots
            .iter()
            .map(|s| RosterEntry {
                player_number: s.number,
                display_name: s.display_name.clone(),
            })
            .collect()
    }

    /// Discovery summary (id, age, live connections).
    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            match_id: self.id,
            created_at: self.created_at,
            players_connected: self.connected_count() as u8,
        }
    }

    /// Reserve the second slot for `identity`.
    ///
    /// Admission check only: the match stays `Waiting` until both push
    /// connections are live.
    pub fn bind_opponent(&mut self, identity: Identity) -> Result<PlayerNumber, SessionError> {
        if self.status != MatchStatus::Waiting {
            return Err(SessionError::NotJoinable);
        }
        if self.slots.iter().any(|s| s.user_id == identity.user_id) {
            return Err(SessionError::AlreadyJoined);
        }
        if self.slots.len() >= 2 {
            return Err(SessionError::Full);
        }

        self.slots.push(PlayerSlot::new(identity, PlayerNumber::Two));
        Ok(PlayerNumber::Two)
    }

    /// Attach a live push connection to the caller's slot.
    ///
    /// Fails closed when the caller holds no slot, the slot already has
    /// a live connection, or the match is terminal. The match activates
    /// exactly when both slots report a live connection; a later attach
    /// into an `Active` match is a reconnection.
    pub fn attach(
        &mut self,
        user_id: &str,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<AttachOutcome, SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::NotJoinable);
        }

        let was_waiting = self.status == MatchStatus::Waiting;
        let slot = self.slot_mut(user_id).ok_or(SessionError::NoSlot)?;
        if slot.connected {
            return Err(SessionError::AlreadyAttached);
        }
        slot.connected = true;
        slot.sender = Some(sender);
        let player_number = slot.number;

        let both = self.both_connected();
        if both {
            self.grace_ticks_left = None;
        }

        let activated = was_waiting && both;
        if activated {
            self.status = MatchStatus::Active;
            self.started_at = Some(Utc::now());
            tick::serve(&mut self.game, &self.config, &mut self.rng);
        }

        Ok(AttachOutcome {
            player_number,
            waiting_for_opponent: !both,
            activated,
            reconnected: !was_waiting,
        })
    }

    /// Mark a connection lost without destroying the slot.
    ///
    /// Returns the slot's side when a live connection was actually
    /// dropped. While `Active`, starts the reconnection grace countdown.
    pub fn detach(&mut self, user_id: &str) -> Option<PlayerNumber> {
        let slot = self.slot_mut(user_id)?;
        if !slot.connected {
            return None;
        }
        slot.connected = false;
        slot.sender = None;
        let number = slot.number;

        if self.status == MatchStatus::Active && self.grace_ticks_left.is_none() {
            self.grace_ticks_left = Some(self.reconnect_grace_ticks);
        }

        Some(number)
    }

    /// Apply a paddle-move command from a connected participant.
    ///
    /// Silently ignored unless the match is active, unpaused, and the
    /// caller's slot is live (protocol errors are client bugs).
    /// Returns whether the paddle moved.
    pub fn move_paddle(&mut self, user_id: &str, direction: PaddleDirection) -> bool {
        if self.status != MatchStatus::Active || self.game.is_paused {
            return false;
        }
        let number = match self.slot(user_id) {
            Some(slot) if slot.connected => slot.number,
            _ => return false,
        };
        tick::move_paddle(&mut self.game, &self.config, number, direction);
        true
    }

    /// Pause ticking. Returns the initiator's display name when applied.
    pub fn pause(&mut self, user_id: &str) -> Option<String> {
        if self.status != MatchStatus::Active || self.game.is_paused {
            return None;
        }
        let slot = self.slot(user_id).filter(|s| s.connected)?;
        let name = slot.display_name.clone();
        self.game.is_paused = true;
        Some(name)
    }

    /// Resume ticking. Returns the initiator's display name when applied.
    pub fn resume(&mut self, user_id: &str) -> Option<String> {
        if self.status != MatchStatus::Active || !self.game.is_paused {
            return None;
        }
        let slot = self.slot(user_id).filter(|s| s.connected)?;
        let name = slot.display_name.clone();
        self.game.is_paused = false;
        Some(name)
    }

    /// Drive the session one tick.
    ///
    /// Physics advances only while active, both connections live, and
    /// unpaused. While a slot is dark the grace countdown runs instead;
    /// on expiry the match cancels, exactly once.
    pub fn run_tick(&mut self) -> SessionTick {
        let mut result = SessionTick::default();

        if self.status != MatchStatus::Active {
            return result;
        }

        if !self.both_connected() {
            match self.grace_ticks_left {
                Some(0) | None => {
                    self.status = MatchStatus::Cancelled;
                    self.finished_at = Some(Utc::now());
                    self.grace_ticks_left = None;
                    result.cancelled = true;
                }
                Some(ref mut left) => {
                    *left -= 1;
                }
            }
            return result;
        }

        if self.game.is_paused {
            return result;
        }

        let outcome = tick::tick(&mut self.game, &self.config, &mut self.rng);
        result.events = outcome.events;
        result.finished = outcome.finished;

        if outcome.finished {
            self.status = MatchStatus::Finished;
            self.finished_at = Some(Utc::now());
        } else {
            result.snapshot = Some(self.game.clone());
        }

        result
    }

    /// Cancel the match, if it has not already reached a terminal state.
    ///
    /// Used by idle eviction of `Waiting` matches.
    pub fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.status = MatchStatus::Cancelled;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Seconds between activation and the terminal transition.
    pub fn duration_seconds(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_seconds().max(0) as u64,
            _ => 0,
        }
    }

    /// Build the persistence record for a finished match.
    pub fn finalize(&self) -> Option<MatchRecord> {
        if self.status != MatchStatus::Finished || self.slots.len() != 2 {
            return None;
        }
        let winner = self.game.winner?;
        let winner_id = self
            .slots
            .iter()
            .find(|s| s.number == winner)
            .map(|s| s.user_id.clone())?;

        Some(MatchRecord {
            match_id: self.id,
            player1_id: self.slots[0].user_id.clone(),
            player2_id: self.slots[1].user_id.clone(),
            score1: self.game.score.player1,
            score2: self.game.score.player2,
            winner_id,
            duration_seconds: self.duration_seconds(),
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        })
    }

    /// Send a message to every slot with a live connection.
    ///
    /// Uses `try_send` so a client that stopped draining its channel can
    /// never block the caller; the tick loop broadcasts while holding
    /// the session lock. Returns the user ids whose channel was full or
    /// closed, for the caller to treat as dead connections.
    pub fn broadcast(&self, message: ServerMessage) -> Vec<String> {
        self.send_where(|_| true, message)
    }

    /// Like [`MatchSession::broadcast`], but skips `user_id`'s own slot.
    pub fn broadcast_others(&self, user_id: &str, message: ServerMessage) -> Vec<String> {
        self.send_where(|slot| slot.user_id != user_id, message)
    }

    fn send_where<F>(&self, include: F, message: ServerMessage) -> Vec<String>
    where
        F: Fn(&PlayerSlot) -> bool,
    {
        let mut stalled = Vec::new();
        for slot in &self.slots {
            if !include(slot) {
                continue;
            }
            if let Some(ref sender) = slot.sender {
                if sender.try_send(message.clone()).is_err() {
                    stalled.push(slot.user_id.clone());
                }
            }
        }
        stalled
    }
}
