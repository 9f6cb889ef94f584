//! Session Runner
//!
//! Hosts one engine on a tokio task. Remote peers propose through an
//! `mpsc` inbox, observe executed messages on a `broadcast` channel, and the
//! host can be stopped through a `watch` flag. The simulation itself stays
//! single-threaded: inbox proposals are only drained between frames.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::core::hash::StateHash;
use crate::game::engine::{Engine, FrameReport};
use crate::game::message::{Message, Sender};
use crate::game::token::{ActorId, PlayerId, RegistryError};
use crate::session::protocol::{Broadcast, Envelope};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Configuration for a session host.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock time between frames.
    pub tick_interval: Duration,
    /// Simulated seconds per frame.
    pub frame_dt: f64,
    /// Pending proposals before `propose` waits.
    pub inbox_capacity: usize,
    /// Broadcasts retained for slow subscribers.
    pub broadcast_capacity: usize,
    /// Stop after this many frames even without a winner.
    pub max_frames: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_micros(16_667),
            frame_dt: 1.0 / 60.0,
            inbox_capacity: 256,
            broadcast_capacity: 1024,
            max_frames: None,
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// The host has stopped.
    #[error("Session is closed")]
    Closed,

    /// A peer tried to propose as the referee.
    #[error("Only the host may speak for the referee")]
    ForgedReferee,

    /// The world's identity table is corrupt.
    #[error("Token registry corrupted: {0}")]
    Registry(#[from] RegistryError),
}

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Session identifier
    pub id: SessionId,
    /// Frames simulated
    pub frames: u64,
    /// Winner, if the game ended
    pub winner: Option<PlayerId>,
    /// Final world hash
    pub final_hash: StateHash,
    /// Messages executed
    pub applied: u64,
    /// Messages refused
    pub rejected: u64,
}

/// Peer-facing side of a session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    inbox: mpsc::Sender<Envelope>,
    broadcasts: broadcast::Sender<Broadcast>,
    shutdown: watch::Sender<bool>,
}

impl SessionHandle {
    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Queue a proposal for the next frame.
    ///
    /// The envelope's actor sender is trusted as given. Hand peers a
    /// [`PeerHandle`] instead, which fixes the sender to one actor.
    pub async fn propose(&self, envelope: Envelope) -> Result<(), SessionError> {
        if envelope.sender == Sender::Referee {
            return Err(SessionError::ForgedReferee);
        }
        self.inbox.send(envelope).await.map_err(|_| SessionError::Closed)
    }

    /// A proposal handle bound to `actor`; everything it sends is sent as
    /// that actor.
    pub fn peer(&self, actor: ActorId) -> PeerHandle {
        PeerHandle {
            actor,
            inbox: self.inbox.clone(),
        }
    }

    /// Receive every message executed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.broadcasts.subscribe()
    }

    /// Ask the host to stop after the current frame.
    pub fn shutdown(&self) {
        // Err only means the host already exited.
        let _ = self.shutdown.send(true);
    }
}

/// Proposal side of a session for one actor.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    actor: ActorId,
    inbox: mpsc::Sender<Envelope>,
}

impl PeerHandle {
    /// Actor this handle speaks for.
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Queue a message for the next frame, sent as this handle's actor.
    pub async fn propose(&self, message: Message) -> Result<(), SessionError> {
        self.inbox
            .send(Envelope::new(Sender::Actor(self.actor), message))
            .await
            .map_err(|_| SessionError::Closed)
    }
}

/// Host side of a session. Create, subscribe through the handle, then
/// `tokio::spawn(session.run())`.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    engine: Engine,
    inbox: mpsc::Receiver<Envelope>,
    broadcasts: broadcast::Sender<Broadcast>,
    shutdown: watch::Receiver<bool>,
    applied: u64,
    rejected: u64,
}

impl Session {
    /// Wrap an engine in a new session with a random id.
    pub fn new(engine: Engine, config: SessionConfig) -> (Self, SessionHandle) {
        let id = uuid::Uuid::new_v4().into_bytes();
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = SessionHandle {
            id,
            inbox: inbox_tx,
            broadcasts: broadcast_tx.clone(),
            shutdown: shutdown_tx,
        };
        let session = Self {
            id,
            config,
            engine,
            inbox: inbox_rx,
            broadcasts: broadcast_tx,
            shutdown: shutdown_rx,
            applied: 0,
            rejected: 0,
        };
        (session, handle)
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Run until the game ends, `max_frames` is reached, or shutdown.
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        info!(session = %hex::encode(self.id), "Session started");

        let report = self.engine.start()?;
        self.publish(&report);

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    while let Ok(envelope) = self.inbox.try_recv() {
                        self.engine.submit(envelope.sender, envelope.message);
                    }

                    let report = self.engine.update(self.config.frame_dt)?;
                    self.publish(&report);

                    if self.engine.world().is_over() {
                        break;
                    }
                    if self.config.max_frames.is_some_and(|max| report.frame >= max) {
                        debug!(frame = report.frame, "Frame limit reached");
                        break;
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!("Shutdown requested");
                        break;
                    }
                }
            }
        }

        let world = self.engine.world();
        let summary = SessionSummary {
            id: self.id,
            frames: world.frame(),
            winner: world.winner(),
            final_hash: world.compute_hash(),
            applied: self.applied,
            rejected: self.rejected,
        };
        info!(
            session = %hex::encode(self.id),
            frames = summary.frames,
            winner = ?summary.winner,
            hash = %hex::encode(summary.final_hash),
            "Session ended"
        );
        Ok(summary)
    }

    fn publish(&mut self, report: &FrameReport) {
        self.applied += report.applied.len() as u64;
        self.rejected += report.rejected.len() as u64;

        for applied in &report.applied {
            // Err only means nobody is subscribed right now.
            if self.broadcasts.send(Broadcast::from_applied(report.frame, applied)).is_err() {
                trace!(frame = report.frame, "No subscribers");
            }
        }
    }
}
