//! WebSocket Match Server
//!
//! Async WebSocket server for two-player matches. Two endpoints share
//! one listener: `/ws/lobby` carries the control plane (create, join,
//! discover) and `/ws/match/{id}` is the per-match push channel. Every
//! connection presents a JWT at handshake time, via the `token` query
//! parameter or an `Authorization: Bearer` header, and is closed before
//! any match interaction when validation fails.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::events::GameEvent;
use crate::network::auth::{validate_token, AuthConfig, Identity};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::registry::{MatchRegistry, RegistryError, RegistryPolicy, SharedSession};
use crate::network::session::SessionError;
use crate::network::sink::ResultSink;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Simulation tick rate (Hz).
    pub tick_rate: u32,
    /// Age after which a waiting match is evicted.
    pub idle_eviction: Duration,
    /// How long a disconnected player may stay dark before cancellation.
    pub reconnect_grace: Duration,
    /// Maximum concurrent matches.
    pub max_matches: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 1000,
            tick_rate: crate::TICK_RATE,
            idle_eviction: Duration::from_secs(300),
            reconnect_grace: Duration::from_secs(30),
            max_matches: 1000,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Build the configuration from environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, GameServerError> {
        let mut config = Self::default();

        if let Some(addr) = env_parse::<SocketAddr>("PONG_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(v) = env_parse::<usize>("PONG_MAX_CONNECTIONS")? {
            config.max_connections = v;
        }
        if let Some(v) = env_parse::<u32>("PONG_TICK_RATE")? {
            if v == 0 {
                return Err(GameServerError::Config(
                    "PONG_TICK_RATE must be positive".into(),
                ));
            }
            config.tick_rate = v;
        }
        if let Some(secs) = env_parse::<u64>("PONG_IDLE_EVICTION_SECS")? {
            config.idle_eviction = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("PONG_RECONNECT_GRACE_SECS")? {
            config.reconnect_grace = Duration::from_secs(secs);
        }
        if let Some(v) = env_parse::<usize>("PONG_MAX_MATCHES")? {
            config.max_matches = v;
        }

        Ok(config)
    }
}

/// Read and parse one environment variable; unset is `None`.
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, GameServerError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| GameServerError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Match server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Endpoint a connection was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    /// Control plane: create, join, list.
    Lobby,
    /// Push channel for one match.
    Match(Uuid),
}

/// Parse a request target into an endpoint and the `token` query value.
fn parse_target(target: &str) -> Option<(Endpoint, Option<String>)> {
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };

    let token = query.and_then(|q| {
        q.split('&').find_map(|pair| {
            pair.split_once('=')
                .and_then(|(k, v)| (k == "token" && !v.is_empty()).then(|| v.to_string()))
        })
    });

    let path = path.trim_end_matches('/');
    let endpoint = if path == "/ws/lobby" {
        Endpoint::Lobby
    } else if let Some(rest) = path.strip_prefix("/ws/match/") {
        Endpoint::Match(Uuid::parse_str(rest).ok()?)
    } else {
        return None;
    };

    Some((endpoint, token))
}

/// Extract the token from an `Authorization: Bearer` header value.
fn strip_bearer(value: &str) -> Option<String> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Map a registry error to its wire code.
fn registry_error_code(err: &RegistryError) -> ErrorCode {
    match err {
        RegistryError::NotFound => ErrorCode::NotFound,
        RegistryError::NotJoinable => ErrorCode::NotJoinable,
        RegistryError::Full => ErrorCode::Full,
        RegistryError::AlreadyJoined => ErrorCode::AlreadyJoined,
        RegistryError::InvalidMaxScore => ErrorCode::InvalidMaxScore,
        RegistryError::Exhausted => ErrorCode::ServerOverloaded,
    }
}

/// Map a session error to its wire code.
fn session_error_code(err: &SessionError) -> ErrorCode {
    match err {
        SessionError::NotJoinable | SessionError::NoSlot => ErrorCode::NotJoinable,
        SessionError::Full => ErrorCode::Full,
        SessionError::AlreadyJoined | SessionError::AlreadyAttached => ErrorCode::AlreadyJoined,
    }
}

/// Current wall clock as Unix milliseconds.
fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

type WsReader = SplitStream<WebSocketStream<TcpStream>>;

/// The match server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Token validation configuration.
    auth: Arc<AuthConfig>,
    /// Live matches.
    registry: Arc<MatchRegistry>,
    /// Destination for finished-match records.
    sink: Arc<dyn ResultSink>,
    /// Live connection count.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new match server.
    pub fn new(config: ServerConfig, auth: AuthConfig, sink: Arc<dyn ResultSink>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let policy = RegistryPolicy {
            max_matches: config.max_matches,
            idle_after: chrono::Duration::seconds(config.idle_eviction.as_secs() as i64),
            reconnect_grace_ticks: (config.reconnect_grace.as_secs() as u32)
                .saturating_mul(config.tick_rate),
        };

        Self {
            config,
            auth: Arc::new(auth),
            registry: Arc::new(MatchRegistry::new(policy)),
            sink,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Run the server until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Match server listening on {}", self.config.bind_addr);

        // Spawn the idle-eviction task
        let eviction_registry = self.registry.clone();
        let eviction_handle = tokio::spawn(async move {
            Self::run_eviction_loop(eviction_registry).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        eviction_handle.abort();
        Ok(())
    }

    /// Signal the server to stop accepting and wind down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Live match count.
    pub async fn match_count(&self) -> usize {
        self.registry.count().await
    }

    /// Handle one accepted TCP connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let auth = self.auth.clone();
        let registry = self.registry.clone();
        let sink = self.sink.clone();
        let connections = self.connections.clone();
        let tick_rate = self.config.tick_rate;
        let shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            Self::serve_connection(stream, addr, auth, registry, sink, tick_rate, shutdown_rx)
                .await;
            connections.fetch_sub(1, Ordering::Relaxed);
            debug!("Connection {} closed", addr);
        });
    }

    /// Handshake, authenticate, and dispatch one connection.
    #[allow(clippy::too_many_arguments)]
    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        auth: Arc<AuthConfig>,
        registry: Arc<MatchRegistry>,
        sink: Arc<dyn ResultSink>,
        tick_rate: u32,
        shutdown_rx: broadcast::Receiver<()>,
    ) {
        // Capture the request target and Authorization header during the
        // handshake; tungstenite exposes them only through this callback
        let mut target = None;
        let mut bearer = None;
        let callback = |req: &Request, resp: Response| {
            target = Some(req.uri().to_string());
            bearer = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(strip_bearer);
            Ok(resp)
        };

        let ws_stream = match accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                debug!("WebSocket handshake failed for {}: {}", addr, e);
                return;
            }
        };

        let (mut ws_sender, ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

        // Sender task: serialize and push outbound messages
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let parsed = target.as_deref().and_then(parse_target);
        let endpoint = match parsed {
            Some((endpoint, query_token)) => {
                let token = query_token.or(bearer);
                match token.as_deref().map(|t| validate_token(t, &auth)) {
                    Some(Ok(identity)) => Some((endpoint, identity)),
                    Some(Err(e)) => {
                        debug!("Rejected connection from {}: {}", addr, e);
                        let _ = msg_tx
                            .send(ServerMessage::Error {
                                code: ErrorCode::NotAuthenticated,
                                message: e.to_string(),
                            })
                            .await;
                        None
                    }
                    None => {
                        let _ = msg_tx
                            .send(ServerMessage::Error {
                                code: ErrorCode::NotAuthenticated,
                                message: "missing token".into(),
                            })
                            .await;
                        None
                    }
                }
            }
            None => {
                let _ = msg_tx
                    .send(ServerMessage::Error {
                        code: ErrorCode::InvalidInput,
                        message: "unknown endpoint".into(),
                    })
                    .await;
                None
            }
        };

        match endpoint {
            Some((Endpoint::Lobby, identity)) => {
                Self::run_lobby_connection(identity, registry, ws_receiver, msg_tx, shutdown_rx)
                    .await;
            }
            Some((Endpoint::Match(id), identity)) => {
                Self::run_match_connection(
                    id,
                    identity,
                    registry,
                    sink,
                    tick_rate,
                    ws_receiver,
                    msg_tx,
                    shutdown_rx,
                )
                .await;
            }
            // Dropping the sender lets the queue drain, so rejection
            // messages still reach the client before the close
            None => drop(msg_tx),
        }

        let _ = sender_task.await;
    }

    /// Control-plane loop: create, join, list.
    async fn run_lobby_connection(
        identity: Identity,
        registry: Arc<MatchRegistry>,
        mut ws_receiver: WsReader,
        msg_tx: mpsc::Sender<ServerMessage>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            let msg = tokio::select! {
                msg = ws_receiver.next() => msg,
                _ = shutdown_rx.recv() => break,
            };

            let text = match msg {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("WebSocket error on lobby channel: {}", e);
                    break;
                }
                _ => continue,
            };

            let client_msg = match ClientMessage::from_json(&text) {
                Ok(m) => m,
                Err(e) => {
                    let _ = msg_tx
                        .send(ServerMessage::Error {
                            code: ErrorCode::InvalidInput,
                            message: format!("invalid message: {e}"),
                        })
                        .await;
                    continue;
                }
            };

            match client_msg {
                ClientMessage::CreateMatch { max_score } => {
                    match registry.create(identity.clone(), max_score).await {
                        Ok((match_id, _)) => {
                            let _ = msg_tx.send(ServerMessage::MatchCreated { match_id }).await;
                        }
                        Err(e) => {
                            let _ = msg_tx
                                .send(ServerMessage::Error {
                                    code: registry_error_code(&e),
                                    message: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
                ClientMessage::JoinMatch { match_id } => {
                    match registry.join(match_id, identity.clone()).await {
                        Ok((player_number, _)) => {
                            let _ = msg_tx
                                .send(ServerMessage::MatchJoined {
                                    match_id,
                                    player_number,
                                })
                                .await;
                        }
                        Err(e) => {
                            let _ = msg_tx
                                .send(ServerMessage::Error {
                                    code: registry_error_code(&e),
                                    message: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
                ClientMessage::ListMatches => {
                    let matches = registry.list_waiting().await;
                    let _ = msg_tx.send(ServerMessage::MatchList { matches }).await;
                }
                ClientMessage::Ping { timestamp } => {
                    let _ = msg_tx
                        .send(ServerMessage::Pong {
                            timestamp,
                            server_time: now_millis(),
                        })
                        .await;
                }
                ClientMessage::PaddleMove { .. } | ClientMessage::Pause | ClientMessage::Resume => {
                    let _ = msg_tx
                        .send(ServerMessage::Error {
                            code: ErrorCode::InvalidInput,
                            message: "not a lobby message".into(),
                        })
                        .await;
                }
            }
        }
    }

    /// Push-channel loop for one match connection.
    #[allow(clippy::too_many_arguments)]
    async fn run_match_connection(
        match_id: Uuid,
        identity: Identity,
        registry: Arc<MatchRegistry>,
        sink: Arc<dyn ResultSink>,
        tick_rate: u32,
        mut ws_receiver: WsReader,
        msg_tx: mpsc::Sender<ServerMessage>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let session = match registry.get(match_id).await {
            Some(s) => s,
            None => {
                let _ = msg_tx
                    .send(ServerMessage::Error {
                        code: ErrorCode::NotFound,
                        message: "match not found".into(),
                    })
                    .await;
                return;
            }
        };

        let outcome = {
            let mut s = session.write().await;
            s.attach(&identity.user_id, msg_tx.clone())
        };

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                let _ = msg_tx
                    .send(ServerMessage::Error {
                        code: session_error_code(&e),
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        let _ = msg_tx
            .send(ServerMessage::Connected {
                match_id,
                player_number: outcome.player_number,
                waiting_for_opponent: outcome.waiting_for_opponent,
            })
            .await;

        if outcome.activated {
            let players = session.read().await.roster();
            Self::broadcast_to_match(&session, ServerMessage::MatchStarted { players }).await;

            info!(match_id = %match_id, "match activated");
            let loop_session = session.clone();
            let loop_registry = registry.clone();
            let loop_sink = sink.clone();
            tokio::spawn(async move {
                Self::run_match_loop(match_id, loop_session, loop_registry, loop_sink, tick_rate)
                    .await;
            });
        } else if outcome.reconnected {
            // Tell the surviving side only; the rejoiner already knows
            let stalled = {
                let s = session.read().await;
                s.broadcast_others(
                    &identity.user_id,
                    ServerMessage::OpponentReconnected {
                        player_number: outcome.player_number,
                        display_name: identity.display_name.clone(),
                    },
                )
            };
            Self::reap_stalled(&session, stalled).await;

            // Resync the rejoiner
            let state = session.read().await.snapshot();
            let _ = msg_tx.send(ServerMessage::State { state }).await;
        }

        // Command loop
        loop {
            let msg = tokio::select! {
                msg = ws_receiver.next() => msg,
                _ = shutdown_rx.recv() => break,
            };

            let text = match msg {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("WebSocket error on match channel: {}", e);
                    break;
                }
                _ => continue,
            };

            let client_msg = match ClientMessage::from_json(&text) {
                Ok(m) => m,
                Err(e) => {
                    let _ = msg_tx
                        .send(ServerMessage::Error {
                            code: ErrorCode::InvalidInput,
                            message: format!("invalid message: {e}"),
                        })
                        .await;
                    continue;
                }
            };

            match client_msg {
                ClientMessage::PaddleMove { direction } => {
                    let mut s = session.write().await;
                    s.move_paddle(&identity.user_id, direction);
                }
                ClientMessage::Pause => {
                    let by = {
                        let mut s = session.write().await;
                        s.pause(&identity.user_id)
                    };
                    if let Some(by) = by {
                        Self::broadcast_to_match(&session, ServerMessage::Paused { by }).await;
                    }
                }
                ClientMessage::Resume => {
                    let by = {
                        let mut s = session.write().await;
                        s.resume(&identity.user_id)
                    };
                    if let Some(by) = by {
                        Self::broadcast_to_match(&session, ServerMessage::Resumed { by }).await;
                    }
                }
                ClientMessage::Ping { timestamp } => {
                    let _ = msg_tx
                        .send(ServerMessage::Pong {
                            timestamp,
                            server_time: now_millis(),
                        })
                        .await;
                }
                ClientMessage::CreateMatch { .. }
                | ClientMessage::JoinMatch { .. }
                | ClientMessage::ListMatches => {
                    let _ = msg_tx
                        .send(ServerMessage::Error {
                            code: ErrorCode::InvalidInput,
                            message: "not a match message".into(),
                        })
                        .await;
                }
            }
        }

        // Connection gone: free the slot but keep it reserved for a
        // reconnect while the grace countdown runs
        let dropped = {
            let mut s = session.write().await;
            s.detach(&identity.user_id)
                .map(|number| (number, s.status().is_terminal()))
        };

        if let Some((player_number, terminal)) = dropped {
            if !terminal {
                Self::broadcast_to_match(
                    &session,
                    ServerMessage::OpponentDisconnected {
                        player_number,
                        display_name: identity.display_name.clone(),
                    },
                )
                .await;
            }
        }
    }

    /// Broadcast to a match and reap any slot whose channel was full or
    /// closed. The send itself never awaits, so a stalled client cannot
    /// hold the session lock against the tick loop.
    async fn broadcast_to_match(session: &SharedSession, message: ServerMessage) {
        let stalled = {
            let s = session.read().await;
            s.broadcast(message)
        };
        Self::reap_stalled(session, stalled).await;
    }

    /// Detach slots that stopped draining their channel, as if the
    /// transport had dropped: the grace countdown starts and the
    /// survivor is notified.
    async fn reap_stalled(session: &SharedSession, stalled: Vec<String>) {
        for user_id in stalled {
            let dropped = {
                let mut s = session.write().await;
                let display_name = s
                    .slot(&user_id)
                    .map(|slot| slot.display_name.clone())
                    .unwrap_or_default();
                s.detach(&user_id)
                    .map(|player_number| (player_number, display_name, s.status().is_terminal()))
            };

            if let Some((player_number, display_name, terminal)) = dropped {
                warn!(player = %player_number, "dropped connection with a full outbound queue");
                if !terminal {
                    let s = session.read().await;
                    let _ = s.broadcast(ServerMessage::OpponentDisconnected {
                        player_number,
                        display_name,
                    });
                }
            }
        }
    }

    /// Fixed-rate simulation loop for one match.
    ///
    /// Spawned exactly once, at activation. Holds the session write lock
    /// only for the tick itself; broadcasting happens under a read lock.
    async fn run_match_loop(
        match_id: Uuid,
        session: SharedSession,
        registry: Arc<MatchRegistry>,
        sink: Arc<dyn ResultSink>,
        tick_rate: u32,
    ) {
        let tick_duration = Duration::from_micros(1_000_000 / tick_rate as u64);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let result = {
                let mut s = session.write().await;
                s.run_tick()
            };

            if result.cancelled {
                Self::broadcast_to_match(
                    &session,
                    ServerMessage::MatchCancelled {
                        reason: "opponent did not reconnect in time".into(),
                    },
                )
                .await;
                info!(match_id = %match_id, "match cancelled after grace expiry");
                break;
            }

            for event in &result.events {
                if let GameEvent::GoalScored { scorer, .. } = event {
                    let state = session.read().await.snapshot();
                    Self::broadcast_to_match(
                        &session,
                        ServerMessage::GoalScored {
                            scorer: *scorer,
                            state,
                        },
                    )
                    .await;
                }
            }

            if let Some(state) = result.snapshot {
                Self::broadcast_to_match(&session, ServerMessage::State { state }).await;
            }

            if result.finished {
                let (ended, record) = {
                    let s = session.read().await;
                    let snapshot = s.snapshot();
                    let ended = snapshot.winner.map(|winner| ServerMessage::MatchEnded {
                        winner,
                        final_score: snapshot.score,
                        duration_seconds: s.duration_seconds(),
                    });
                    (ended, s.finalize())
                };
                if let Some(message) = ended {
                    Self::broadcast_to_match(&session, message).await;
                }
                if let Some(record) = record {
                    sink.record(record);
                }
                info!(match_id = %match_id, "match finished");
                break;
            }
        }

        // Leave the terminal state observable briefly, then reclaim
        tokio::time::sleep(Duration::from_secs(5)).await;
        registry.delete(match_id).await;
    }

    /// Periodic eviction of idle waiting matches.
    async fn run_eviction_loop(registry: Arc<MatchRegistry>) {
        let mut ticker = interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            registry.evict_idle(Utc::now()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::sink::MemorySink;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.idle_eviction, Duration::from_secs(300));
        assert_eq!(config.reconnect_grace, Duration::from_secs(30));
    }

    #[test]
    fn test_config_rejects_bad_env_value() {
        std::env::set_var("PONG_TICK_RATE", "not-a-number");
        let result = ServerConfig::from_env();
        std::env::remove_var("PONG_TICK_RATE");
        assert!(matches!(result, Err(GameServerError::Config(_))));

        std::env::set_var("PONG_TICK_RATE", "0");
        let result = ServerConfig::from_env();
        std::env::remove_var("PONG_TICK_RATE");
        assert!(matches!(result, Err(GameServerError::Config(_))));
    }

    #[test]
    fn test_parse_target_lobby() {
        assert_eq!(
            parse_target("/ws/lobby"),
            Some((Endpoint::Lobby, None))
        );
        assert_eq!(
            parse_target("/ws/lobby?token=abc"),
            Some((Endpoint::Lobby, Some("abc".into())))
        );
        assert_eq!(
            parse_target("/ws/lobby/?foo=1&token=xyz"),
            Some((Endpoint::Lobby, Some("xyz".into())))
        );
    }

    #[test]
    fn test_parse_target_match() {
        let id = Uuid::new_v4();
        let target = format!("/ws/match/{id}?token=t");
        assert_eq!(
            parse_target(&target),
            Some((Endpoint::Match(id), Some("t".into())))
        );
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        assert_eq!(parse_target("/ws/match/not-a-uuid"), None);
        assert_eq!(parse_target("/metrics"), None);
        assert_eq!(parse_target("/"), None);

        // Empty token is the same as no token
        assert_eq!(
            parse_target("/ws/lobby?token="),
            Some((Endpoint::Lobby, None))
        );
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi".into()));
        assert_eq!(strip_bearer("Basic dXNlcg=="), None);
        assert_eq!(strip_bearer("Bearer "), None);
    }

    #[test]
    fn test_registry_error_codes() {
        assert_eq!(
            registry_error_code(&RegistryError::Exhausted),
            ErrorCode::ServerOverloaded
        );
        assert_eq!(
            registry_error_code(&RegistryError::InvalidMaxScore),
            ErrorCode::InvalidMaxScore
        );
        assert_eq!(
            registry_error_code(&RegistryError::NotFound),
            ErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_stalled_client_is_detached_not_awaited() {
        use crate::game::state::GameConfig;
        use crate::network::auth::Identity;
        use crate::network::session::MatchSession;
        use tokio::sync::RwLock;
        use tokio::time::timeout;

        let alice = Identity {
            user_id: "alice".into(),
            display_name: "Alice".into(),
        };
        let bob = Identity {
            user_id: "bob".into(),
            display_name: "Bob".into(),
        };

        let mut session = MatchSession::new(Uuid::new_v4(), GameConfig::default(), 1, 10, alice);
        session.bind_opponent(bob).unwrap();

        // Alice's outbound queue holds a single message
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(16);
        session.attach("alice", tx1).unwrap();
        session.attach("bob", tx2).unwrap();
        let session = Arc::new(RwLock::new(session));

        // First broadcast fills alice's queue; the second must complete
        // anyway and drop her instead of waiting for the queue to drain
        GameServer::broadcast_to_match(&session, ServerMessage::Paused { by: "x".into() }).await;
        let done = timeout(
            Duration::from_millis(500),
            GameServer::broadcast_to_match(&session, ServerMessage::Resumed { by: "x".into() }),
        )
        .await;
        assert!(done.is_ok(), "broadcast must not block on a stalled client");

        {
            let s = session.read().await;
            assert!(!s.slot("alice").unwrap().connected);
            assert!(s.slot("bob").unwrap().connected);
        }

        // The survivor saw the messages and then the drop notification
        assert!(matches!(rx2.recv().await, Some(ServerMessage::Paused { .. })));
        assert!(matches!(rx2.recv().await, Some(ServerMessage::Resumed { .. })));
        assert!(matches!(
            rx2.recv().await,
            Some(ServerMessage::OpponentDisconnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config, AuthConfig::default(), Arc::new(MemorySink::default()));

        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.match_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config, AuthConfig::default(), Arc::new(MemorySink::default()));
        server.shutdown();
    }
}
