//! Token Extensions
//!
//! Per-actor-kind behaviour attached to tokens: a GUI sprite for a bullet, an
//! AI's bookkeeping for a target, and so on. Factories are registered for a
//! `(TokenKind, ActorKind)` pair. The table resolves them exactly once, when
//! a token enters the world, and keeps the instances until it leaves.

use std::collections::BTreeMap;

use tracing::trace;

use crate::game::actor::ActorKind;
use crate::game::state::World;
use crate::game::token::{TokenId, TokenKind};

/// Behaviour attached to one token for one actor kind.
pub trait TokenExtension {
    /// The token was just added to the world.
    fn on_add_to_world(&mut self, _world: &World) {}

    /// Once per frame while the token exists.
    fn on_update_game(&mut self, _world: &World, _dt: f64) {}

    /// The token was just removed; the world no longer holds it.
    fn on_remove_from_world(&mut self, _world: &World) {}
}

/// Builds an extension for a freshly added token.
pub type ExtensionFactory = Box<dyn Fn(TokenId) -> Box<dyn TokenExtension + Send> + Send>;

/// Factory table and live extension instances.
#[derive(Default)]
pub struct ExtensionTable {
    factories: BTreeMap<(TokenKind, ActorKind), ExtensionFactory>,
    live: BTreeMap<(TokenId, ActorKind), Box<dyn TokenExtension + Send>>,
}

impl ExtensionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for a token kind and actor kind.
    pub fn register<F, E>(&mut self, token: TokenKind, actor: ActorKind, factory: F)
    where
        F: Fn(TokenId) -> E + Send + 'static,
        E: TokenExtension + Send + 'static,
    {
        let boxed: ExtensionFactory = Box::new(move |id| Box::new(factory(id)));
        self.factories.insert((token, actor), boxed);
    }

    /// Is a factory registered for this pair?
    pub fn has_factory(&self, token: TokenKind, actor: ActorKind) -> bool {
        self.factories.contains_key(&(token, actor))
    }

    /// Number of live extension instances.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Instantiate extensions for newly added tokens, for every actor kind
    /// present in the engine.
    pub(crate) fn on_tokens_added(
        &mut self,
        world: &World,
        added: &[(TokenId, TokenKind)],
        actor_kinds: &[ActorKind],
    ) {
        for (id, kind) in added {
            for actor in actor_kinds {
                let Some(factory) = self.factories.get(&(*kind, *actor)) else {
                    continue;
                };
                let mut extension = factory(*id);
                extension.on_add_to_world(world);
                trace!(token = %id, ?kind, ?actor, "Extension attached");
                self.live.insert((*id, *actor), extension);
            }
        }
    }

    /// Notify and drop extensions of removed tokens.
    pub(crate) fn on_tokens_removed(&mut self, world: &World, removed: &[(TokenId, TokenKind)]) {
        for (id, _) in removed {
            let keys: Vec<(TokenId, ActorKind)> = self
                .live
                .range((*id, ActorKind::Gui)..=(*id, ActorKind::Remote))
                .map(|(key, _)| *key)
                .collect();
            for key in keys {
                if let Some(mut extension) = self.live.remove(&key) {
                    extension.on_remove_from_world(world);
                }
            }
        }
    }

    /// Per-frame update of every live extension, in token id order.
    pub(crate) fn update(&mut self, world: &World, dt: f64) {
        for extension in self.live.values_mut() {
            extension.on_update_game(world, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use std::sync::{Arc, Mutex};

    struct Logged {
        id: TokenId,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl TokenExtension for Logged {
        fn on_add_to_world(&mut self, _world: &World) {
            self.log.lock().unwrap().push(format!("add {}", self.id));
        }

        fn on_update_game(&mut self, _world: &World, _dt: f64) {
            self.log.lock().unwrap().push(format!("update {}", self.id));
        }

        fn on_remove_from_world(&mut self, _world: &World) {
            self.log.lock().unwrap().push(format!("remove {}", self.id));
        }
    }

    #[test]
    fn test_lifecycle() {
        let world = World::new(GameConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = ExtensionTable::new();

        let sink = log.clone();
        table.register(TokenKind::Bullet, ActorKind::Gui, move |id| Logged { id, log: sink.clone() });
        assert!(table.has_factory(TokenKind::Bullet, ActorKind::Gui));
        assert!(!table.has_factory(TokenKind::Bullet, ActorKind::Ai));

        let added = [(TokenId(4), TokenKind::Bullet), (TokenId(5), TokenKind::Target)];
        table.on_tokens_added(&world, &added, &[ActorKind::Gui, ActorKind::Ai]);
        assert_eq!(table.live_count(), 1);

        table.update(&world, 0.1);
        table.on_tokens_removed(&world, &[(TokenId(4), TokenKind::Bullet)]);
        assert_eq!(table.live_count(), 0);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["add #4".to_string(), "update #4".to_string(), "remove #4".to_string()]
        );
    }

    #[test]
    fn test_absent_actor_kind_gets_nothing() {
        let world = World::new(GameConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut table = ExtensionTable::new();

        let sink = log.clone();
        table.register(TokenKind::Target, ActorKind::Remote, move |id| Logged { id, log: sink.clone() });
        table.on_tokens_added(&world, &[(TokenId(2), TokenKind::Target)], &[ActorKind::Ai]);

        assert_eq!(table.live_count(), 0);
        assert!(log.lock().unwrap().is_empty());
    }
}
