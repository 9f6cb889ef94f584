//! Game Engine
//!
//! Owns one world, its referee, the actors and the extension table, and
//! drives them frame by frame. A frame runs in a fixed order:
//!
//! 1. advance the frame counter
//! 2. tick the world (only while playing)
//! 3. queue referee timers, then the tick's hit reports, then submitted
//!    proposals, then each actor's per-frame proposals
//! 4. check and execute the queue in order; referee reactions to an executed
//!    message join the back of the queue
//! 5. update live token extensions
//!
//! Nothing in a frame depends on wall-clock time.

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, error, info, trace};

use crate::game::actor::{dispatch_applied, dispatch_rejected, Actor, ActorKind};
use crate::game::config::{ConfigError, GameConfig};
use crate::game::events::GameEvent;
use crate::game::extension::ExtensionTable;
use crate::game::message::{Applied, Message, Outcome, Proposal, Rejection, Sender};
use crate::game::referee::Referee;
use crate::game::state::World;
use crate::game::tick::{tick, TickReport};
use crate::game::token::RegistryError;

/// Everything that happened in one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
    /// Frame number after the update
    pub frame: u64,
    /// Physics result, if the world ticked
    pub tick: Option<TickReport>,
    /// Executed messages in execution order
    pub applied: Vec<Applied>,
    /// Refused messages in proposal order
    pub rejected: Vec<Rejection>,
    /// Events derived from both
    pub events: Vec<GameEvent>,
}

/// A running match.
pub struct Engine {
    world: World,
    referee: Referee,
    actors: Vec<Box<dyn Actor + Send>>,
    extensions: ExtensionTable,
    pending: VecDeque<Proposal>,
    started: bool,
}

impl Engine {
    /// Create an engine for a validated configuration.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let referee = Referee::new(config.sync_interval);
        Ok(Self {
            world: World::new(config),
            referee,
            actors: Vec::new(),
            extensions: ExtensionTable::new(),
            pending: VecDeque::new(),
            started: false,
        })
    }

    /// Attach an actor. Actor ids must be unique within an engine.
    pub fn add_actor(&mut self, actor: Box<dyn Actor + Send>) {
        debug!(actor = %actor.id(), kind = ?actor.kind(), "Actor added");
        self.actors.push(actor);
    }

    /// The extension table, for registering factories before `start`.
    pub fn extensions_mut(&mut self) -> &mut ExtensionTable {
        &mut self.extensions
    }

    /// Current world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Number of attached actors.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Has `start` been called?
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Queue a proposal for the next frame.
    pub fn submit(&mut self, sender: Sender, message: Message) {
        self.pending.push_back(Proposal::new(sender, message));
    }

    /// Begin the match: the referee learns the player count and every actor
    /// gets to propose its opening messages, which are processed at once.
    ///
    /// Calling `start` twice does nothing the second time.
    pub fn start(&mut self) -> Result<FrameReport, RegistryError> {
        let mut report = FrameReport {
            frame: self.world.frame(),
            ..Default::default()
        };
        if self.started {
            return Ok(report);
        }
        self.started = true;

        let num_players = self.world.config().num_players;
        info!(num_players, actors = self.actors.len(), "Starting match");

        let mut queue = VecDeque::new();
        for message in self.referee.on_start_game(num_players, &self.world) {
            queue.push_back(Proposal::new(Sender::Referee, message));
        }
        for actor in self.actors.iter_mut() {
            let sender = Sender::Actor(actor.id());
            for message in actor.on_start_game(num_players) {
                queue.push_back(Proposal::new(sender, message));
            }
        }
        queue.extend(self.pending.drain(..));

        self.process(queue, &mut report)?;
        Ok(report)
    }

    /// Advance one frame of `dt` seconds.
    pub fn update(&mut self, dt: f64) -> Result<FrameReport, RegistryError> {
        self.world.advance_frame();
        let mut report = FrameReport {
            frame: self.world.frame(),
            ..Default::default()
        };

        let mut queue = VecDeque::new();

        let ticked = (!self.world.is_over()).then(|| tick(&mut self.world, dt));

        // Timer snapshots describe the world as ticked, so they run before
        // any hit removes a token they name.
        for message in self.referee.on_update(&self.world, dt) {
            queue.push_back(Proposal::new(Sender::Referee, message));
        }
        if let Some(ticked) = ticked {
            for hit in &ticked.hits {
                queue.push_back(Proposal::new(Sender::Referee, hit.clone()));
            }
            report.tick = Some(ticked);
        }
        queue.extend(self.pending.drain(..));
        for actor in self.actors.iter_mut() {
            let sender = Sender::Actor(actor.id());
            for message in actor.on_update_game(&self.world, dt) {
                queue.push_back(Proposal::new(sender, message));
            }
        }

        self.process(queue, &mut report)?;
        self.extensions.update(&self.world, dt);

        trace!(
            frame = report.frame,
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            "Frame complete"
        );
        Ok(report)
    }

    fn process(&mut self, mut queue: VecDeque<Proposal>, report: &mut FrameReport) -> Result<(), RegistryError> {
        let actor_kinds: Vec<ActorKind> = self
            .actors
            .iter()
            .map(|a| a.kind())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut sequence: u32 = 0;

        while let Some(Proposal { sender, message }) = queue.pop_front() {
            let outcome = match self.world.handle(sender, message) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, frame = self.world.frame(), "Token registry corrupted");
                    return Err(e);
                }
            };

            match outcome {
                Outcome::Accepted(applied) => {
                    trace!(%sender, message = applied.message.name(), "Message applied");

                    self.extensions.on_tokens_removed(&self.world, &applied.removed);
                    self.extensions.on_tokens_added(&self.world, &applied.added, &actor_kinds);

                    for actor in self.actors.iter_mut() {
                        dispatch_applied(actor.as_mut(), &self.world, &applied);
                    }
                    for follow_up in self.referee.on_applied(&self.world, &applied) {
                        queue.push_back(Proposal::new(Sender::Referee, follow_up));
                    }

                    if let Some(event) = GameEvent::from_applied(self.world.frame(), sequence, &applied) {
                        report.events.push(event);
                    }
                    report.applied.push(applied);
                }
                Outcome::Rejected(rejection) => {
                    debug!(
                        %sender,
                        message = rejection.message.name(),
                        error = %rejection.error,
                        "Message rejected"
                    );

                    for actor in self.actors.iter_mut() {
                        dispatch_rejected(actor.as_mut(), &rejection);
                    }

                    report.events.push(GameEvent::rejected(self.world.frame(), sequence, &rejection));
                    report.rejected.push(rejection);
                }
            }
            sequence += 1;
        }

        Ok(())
    }
}
