//! Sources of execs other than the local player.
//!
//! Each game binds one [`Ai`] per category (denizens, intruders, minions) and
//! optionally one per entity. The turn driver polls them once per frame and
//! never while an exec is being maintained; an AI that thinks on its own
//! thread hands execs over a channel and waits to hear they were applied.

mod inactive;
mod net;
mod scripted;

pub use inactive::InactiveAi;
pub use net::NetAi;
pub use scripted::ScriptedAi;

use std::collections::BTreeMap;

use haunts_core::{ActionExec, EntityId, Game, Side};
use tracing::debug;

/// What a binding applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AiTarget {
    Denizens,
    Intruders,
    Minions,
    Entity(EntityId),
}

impl AiTarget {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "minions" => Some(Self::Minions),
            other => match Side::parse(other)? {
                Side::Denizens => Some(Self::Denizens),
                Side::Intruders => Some(Self::Intruders),
                _ => None,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AiPoll {
    /// Still thinking.
    Pending,
    Exec(ActionExec),
    /// No more execs this turn.
    Done,
}

pub trait Ai: Send {
    /// Starts a turn for `ents`.
    fn activate(&mut self, game: &Game, ents: &[EntityId]);

    fn active(&self) -> bool;

    /// Stops thinking for good.
    fn terminate(&mut self);

    fn poll(&mut self) -> AiPoll;

    /// The last exec handed out has been applied, or dropped.
    fn applied(&mut self, _game: &Game) {}

    /// Peer's recorded after-state for the turn just replayed.
    fn checkpoint(&mut self) -> Option<String> {
        None
    }
}

/// Every binding of one game.
pub struct AiSet {
    denizens: Box<dyn Ai>,
    intruders: Box<dyn Ai>,
    minions: Box<dyn Ai>,
    entities: BTreeMap<EntityId, Box<dyn Ai>>,
    /// Binding that produced the exec in flight.
    pending: Option<AiTarget>,
}

impl Default for AiSet {
    fn default() -> Self {
        Self {
            denizens: Box::new(InactiveAi),
            intruders: Box::new(InactiveAi),
            minions: Box::new(InactiveAi),
            entities: BTreeMap::new(),
            pending: None,
        }
    }
}

impl AiSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a binding, shutting the previous one down.
    pub fn bind(&mut self, target: AiTarget, ai: Box<dyn Ai>) {
        debug!(target: "runtime::ai", ?target, "ai bound");
        let old = match target {
            AiTarget::Denizens => Some(std::mem::replace(&mut self.denizens, ai)),
            AiTarget::Intruders => Some(std::mem::replace(&mut self.intruders, ai)),
            AiTarget::Minions => Some(std::mem::replace(&mut self.minions, ai)),
            AiTarget::Entity(id) => self.entities.insert(id, ai),
        };
        if let Some(mut old) = old {
            old.terminate();
        }
        if self.pending == Some(target) {
            self.pending = None;
        }
    }

    /// Starts `side`'s turn on its bindings. Denizens bring their minions.
    pub fn activate_side(&mut self, game: &Game, side: Side) {
        self.pending = None;
        let own: Vec<EntityId> = game
            .side_entities(side)
            .filter(|e| e.is_alive() && !self.entities.contains_key(&e.id))
            .filter(|e| side != Side::Denizens || !e.def.is_minion())
            .map(|e| e.id)
            .collect();
        match side {
            Side::Denizens => {
                self.denizens.activate(game, &own);
                let minions: Vec<EntityId> = game
                    .side_entities(side)
                    .filter(|e| {
                        e.is_alive() && e.def.is_minion() && !self.entities.contains_key(&e.id)
                    })
                    .map(|e| e.id)
                    .collect();
                self.minions.activate(game, &minions);
            }
            Side::Intruders => self.intruders.activate(game, &own),
            _ => return,
        }
        for (id, ai) in &mut self.entities {
            if game.entity(*id).is_some_and(|e| e.is_alive() && e.side() == side) {
                ai.activate(game, &[*id]);
            }
        }
    }

    pub fn any_active(&self) -> bool {
        self.slots().any(|(_, ai)| ai.active())
    }

    /// Next exec from the first active binding that has one.
    ///
    /// Bindings are asked in order: side, minions, then entities by id.
    /// `Done` means every binding is finished for the turn.
    pub fn poll(&mut self) -> AiPoll {
        let mut waiting = false;
        let mut found = None;
        for (target, ai) in self.slots_mut() {
            if !ai.active() {
                continue;
            }
            match ai.poll() {
                AiPoll::Exec(exec) => {
                    found = Some((target, exec));
                    break;
                }
                AiPoll::Pending => waiting = true,
                AiPoll::Done => {}
            }
        }
        if let Some((target, exec)) = found {
            self.pending = Some(target);
            return AiPoll::Exec(exec);
        }
        if waiting { AiPoll::Pending } else { AiPoll::Done }
    }

    pub fn applied(&mut self, game: &Game) {
        let Some(target) = self.pending.take() else {
            return;
        };
        if let Some(ai) = self.get_mut(target) {
            ai.applied(game);
        }
    }

    /// After-state a side binding replayed from, if it has one.
    pub fn checkpoint(&mut self, side: Side) -> Option<String> {
        match side {
            Side::Denizens => self.denizens.checkpoint(),
            Side::Intruders => self.intruders.checkpoint(),
            _ => None,
        }
    }

    pub fn terminate_all(&mut self) {
        for (_, ai) in self.slots_mut() {
            ai.terminate();
        }
    }

    fn get_mut(&mut self, target: AiTarget) -> Option<&mut Box<dyn Ai>> {
        match target {
            AiTarget::Denizens => Some(&mut self.denizens),
            AiTarget::Intruders => Some(&mut self.intruders),
            AiTarget::Minions => Some(&mut self.minions),
            AiTarget::Entity(id) => self.entities.get_mut(&id),
        }
    }

    fn slots(&self) -> impl Iterator<Item = (AiTarget, &Box<dyn Ai>)> {
        [
            (AiTarget::Denizens, &self.denizens),
            (AiTarget::Intruders, &self.intruders),
            (AiTarget::Minions, &self.minions),
        ]
        .into_iter()
        .chain(self.entities.iter().map(|(id, ai)| (AiTarget::Entity(*id), ai)))
    }

    fn slots_mut(&mut self) -> impl Iterator<Item = (AiTarget, &mut Box<dyn Ai>)> {
        [
            (AiTarget::Denizens, &mut self.denizens),
            (AiTarget::Intruders, &mut self.intruders),
            (AiTarget::Minions, &mut self.minions),
        ]
        .into_iter()
        .chain(
            self.entities
                .iter_mut()
                .map(|(id, ai)| (AiTarget::Entity(*id), ai)),
        )
    }
}

impl Drop for AiSet {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out a fixed list of execs, one per poll.
    struct Canned {
        execs: VecDeque<ActionExec>,
        active: bool,
    }

    impl Ai for Canned {
        fn activate(&mut self, _game: &Game, _ents: &[EntityId]) {
            self.active = true;
        }
        fn active(&self) -> bool {
            self.active
        }
        fn terminate(&mut self) {
            self.active = false;
        }
        fn poll(&mut self) -> AiPoll {
            match self.execs.pop_front() {
                Some(exec) => AiPoll::Exec(exec),
                None => {
                    self.active = false;
                    AiPoll::Done
                }
            }
        }
    }

    fn game() -> Game {
        Game::new(
            haunts_core::House::empty("Empty"),
            Default::default(),
            1,
            Side::Denizens,
        )
    }

    #[test]
    fn targets_parse_side_aliases() {
        assert_eq!(AiTarget::parse("haunt"), Some(AiTarget::Denizens));
        assert_eq!(AiTarget::parse("Explorers"), Some(AiTarget::Intruders));
        assert_eq!(AiTarget::parse("minions"), Some(AiTarget::Minions));
        assert_eq!(AiTarget::parse("object"), None);
    }

    #[test]
    fn inactive_bindings_leave_the_player_in_charge() {
        let mut set = AiSet::new();
        set.activate_side(&game(), Side::Denizens);
        assert!(!set.any_active());
        assert_eq!(set.poll(), AiPoll::Done);
    }

    #[test]
    fn side_binding_runs_until_done() {
        let exec = ActionExec::new(EntityId(1), 0, haunts_core::ReadyExec);
        let mut set = AiSet::new();
        set.bind(
            AiTarget::Denizens,
            Box::new(Canned {
                execs: VecDeque::from([exec.clone()]),
                active: false,
            }),
        );
        let game = game();
        set.activate_side(&game, Side::Denizens);
        assert!(set.any_active());
        assert_eq!(set.poll(), AiPoll::Exec(exec));
        set.applied(&game);
        assert_eq!(set.poll(), AiPoll::Done);
        assert!(!set.any_active());
    }
}
