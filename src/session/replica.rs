//! World Replica
//!
//! A peer's copy of the authoritative world. Broadcasts are applied through
//! the same check/execute path as on the host, so the replica's identity
//! table assigns the same ids. Between broadcasts the replica runs the same
//! fixed-step tick, which keeps physics (and therefore hit checks) in
//! lockstep with the host.

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::game::config::GameConfig;
use crate::game::message::{Applied, MessageError, Outcome};
use crate::game::state::World;
use crate::game::tick::tick;
use crate::game::token::RegistryError;
use crate::session::protocol::Broadcast;

/// Replica failures. Any of these means the copy no longer matches the host.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// A broadcast for an earlier frame arrived after a later one.
    #[error("broadcast for frame {got} arrived at frame {current}")]
    OutOfOrder {
        /// Frame of the broadcast
        got: u64,
        /// Replica's frame
        current: u64,
    },

    /// The host executed a message the replica refuses.
    #[error("host accepted {message} but replica rejected it: {error}")]
    Diverged {
        /// Message name
        message: &'static str,
        /// Replica's reason
        error: MessageError,
    },

    /// Broadcasts were dropped; the replica cannot catch up.
    #[error("missed {0} broadcasts")]
    Lagged(u64),

    /// The replica's identity table is corrupt.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A follower world.
#[derive(Clone, Debug)]
pub struct Replica {
    world: World,
    frame_dt: f64,
}

impl Replica {
    /// Empty replica stepping `frame_dt` seconds per frame, matching the host.
    pub fn new(config: GameConfig, frame_dt: f64) -> Self {
        Self {
            world: World::new(config),
            frame_dt,
        }
    }

    /// The replicated world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Simulate forward to `frame`.
    pub fn advance_to(&mut self, frame: u64) -> Result<(), ReplicaError> {
        let current = self.world.frame();
        if frame < current {
            return Err(ReplicaError::OutOfOrder { got: frame, current });
        }
        while self.world.frame() < frame {
            self.world.advance_frame();
            tick(&mut self.world, self.frame_dt);
        }
        Ok(())
    }

    /// Catch up to the broadcast's frame and execute its message.
    pub fn apply(&mut self, broadcast: &Broadcast) -> Result<Applied, ReplicaError> {
        self.advance_to(broadcast.frame)?;
        match self.world.handle(broadcast.sender, broadcast.message.clone())? {
            Outcome::Accepted(applied) => Ok(applied),
            Outcome::Rejected(rejection) => Err(ReplicaError::Diverged {
                message: rejection.message.name(),
                error: rejection.error,
            }),
        }
    }

    /// Apply broadcasts until the host closes the channel. Returns how many
    /// were applied.
    pub async fn follow(&mut self, mut rx: broadcast::Receiver<Broadcast>) -> Result<u64, ReplicaError> {
        let mut applied = 0;
        loop {
            match rx.recv().await {
                Ok(broadcast) => {
                    self.apply(&broadcast)?;
                    applied += 1;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(applied),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, frame = self.world.frame(), "Replica lagged behind host");
                    return Err(ReplicaError::Lagged(missed));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ai::AiActor;
    use crate::game::engine::Engine;
    use crate::game::message::{Message, Sender};
    use crate::game::token::{ActorId, TokenId};
    use crate::session::runner::{Session, SessionConfig};
    use std::time::Duration;

    const DT: f64 = 1.0 / 60.0;

    fn ai_engine(config: &GameConfig) -> Engine {
        let mut engine = Engine::new(config.clone()).unwrap();
        engine.add_actor(Box::new(AiActor::new(ActorId(1), "left", 5, 0.2, 3.0)));
        engine.add_actor(Box::new(AiActor::new(ActorId(2), "right", 5, 0.2, 3.0)));
        engine
    }

    #[test]
    fn test_replica_tracks_host() {
        let config = GameConfig::default();
        let mut engine = ai_engine(&config);
        let mut replica = Replica::new(config, DT);

        let mut broadcasts = Vec::new();
        let report = engine.start().unwrap();
        broadcasts.extend(report.applied.iter().map(|a| Broadcast::from_applied(report.frame, a)));
        for _ in 0..300 {
            let report = engine.update(DT).unwrap();
            broadcasts.extend(report.applied.iter().map(|a| Broadcast::from_applied(report.frame, a)));
        }

        for broadcast in &broadcasts {
            replica.apply(broadcast).unwrap();
        }
        replica.advance_to(engine.world().frame()).unwrap();

        assert_eq!(replica.world().compute_hash(), engine.world().compute_hash());
        assert_eq!(replica.world().registry().len(), engine.world().registry().len());
    }

    #[test]
    fn test_out_of_order_refused() {
        let mut replica = Replica::new(GameConfig::default(), DT);
        replica.advance_to(10).unwrap();
        assert!(matches!(
            replica.advance_to(3),
            Err(ReplicaError::OutOfOrder { got: 3, current: 10 })
        ));
    }

    #[test]
    fn test_divergence_detected() {
        let mut replica = Replica::new(GameConfig::default(), DT);
        let bogus = Broadcast {
            frame: 0,
            sender: Sender::Referee,
            message: Message::EndGame { winner: TokenId(1) },
        };
        assert!(matches!(
            replica.apply(&bogus),
            Err(ReplicaError::Diverged { message: "EndGame", .. })
        ));
    }

    #[tokio::test]
    async fn test_follow_live_session() {
        let config = GameConfig::default();
        let session_config = SessionConfig {
            tick_interval: Duration::from_millis(1),
            max_frames: Some(120),
            broadcast_capacity: 8192,
            ..Default::default()
        };
        let (session, handle) = Session::new(ai_engine(&config), session_config);
        let rx = handle.subscribe();

        let summary = tokio::spawn(session.run()).await.unwrap().unwrap();
        drop(handle);

        let mut replica = Replica::new(config, DT);
        let applied = replica.follow(rx).await.unwrap();
        assert_eq!(applied, summary.applied);

        replica.advance_to(summary.frames).unwrap();
        assert_eq!(replica.world().compute_hash(), summary.final_hash);
    }
}
