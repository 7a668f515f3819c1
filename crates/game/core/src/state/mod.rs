//! The game: house, entities, sides, PRNG and turn bookkeeping.
//!
//! [`Game`] is the single owner of mutable game state. Entities live in a
//! vector in id order and are addressed by [`EntityId`]; code that needs the
//! game threads `&Game`/`&mut Game` through instead of keeping back-pointers.
//! Everything that is part of the replayable state is serialized; registries,
//! LOS grids and textures, the in-flight exec and the event outbox are
//! rebuilt or reattached after a load.

mod placement;
mod visibility;
mod waypoint;

pub use waypoint::Waypoint;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::action::{Action, ActionBehavior, ActionExec, ExecRun};
use crate::config::GameConfig;
use crate::engine::{ActionState, TurnState, side_for_turn};
use crate::entity::{Entity, EntityFlags, EntityId, Side};
use crate::error::{ErrorSeverity, GameError};
use crate::events::{GameEvent, SpriteCommand};
use crate::geom::BoardPos;
use crate::house::{Floor, House, SpawnPatterns};
use crate::los::SideLos;
use crate::registry::Registries;
use crate::rng::GameRng;
use crate::stats::{DamageKind, DamageOutcome};

static EMPTY_FLOOR: Floor = Floor {
    rooms: Vec::new(),
    spawns: Vec::new(),
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    #[error("failed to encode game: {0}")]
    Encode(String),

    #[error("failed to decode game: {0}")]
    Decode(String),
}

impl GameError for SaveError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Encode(_) => ErrorSeverity::Internal,
            Self::Decode(_) => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "SAVE_ENCODE",
            Self::Decode(_) => "SAVE_DECODE",
        }
    }
}

/// Networked game identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInfo {
    pub game_key: String,
    /// Side this peer plays.
    pub side: Side,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    pub house: House,
    /// Index of the floor in play.
    pub floor: usize,
    entities: Vec<Entity>,
    next_entity_id: u32,
    pub side: Side,
    pub turn: u32,
    pub first_side: Side,
    rng: GameRng,
    pub waypoints: Vec<Waypoint>,
    pub action_state: ActionState,
    pub turn_state: TurnState,
    /// Set while the side to move is AI-driven; gates player input.
    pub player_inactive: bool,
    pub intruders_los: SideLos,
    pub denizens_los: SideLos,
    pub selected: Option<EntityId>,
    pub spawn_patterns: SpawnPatterns,
    exec_log: Vec<ActionExec>,
    pub net: Option<NetInfo>,
    pub config: GameConfig,
    pub ended: bool,

    #[serde(skip)]
    current: Option<ExecRun>,
    #[serde(skip)]
    registries: Arc<Registries>,
    #[serde(skip)]
    events: Vec<GameEvent>,
    #[serde(skip)]
    frame: u64,
}

impl Game {
    pub fn new(house: House, registries: Arc<Registries>, seed: u64, first_side: Side) -> Self {
        Self {
            house,
            floor: 0,
            entities: Vec::new(),
            next_entity_id: 1,
            side: first_side,
            turn: 1,
            first_side,
            rng: GameRng::seeded(seed),
            waypoints: Vec::new(),
            action_state: ActionState::NoAction,
            turn_state: TurnState::Init,
            player_inactive: false,
            intruders_los: SideLos::default(),
            denizens_los: SideLos::default(),
            selected: None,
            spawn_patterns: SpawnPatterns::default(),
            exec_log: Vec::new(),
            net: None,
            config: GameConfig::default(),
            ended: false,
            current: None,
            registries,
            events: Vec::new(),
            frame: 0,
        }
    }

    pub fn with_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    // ===== registries and house =====

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn registries_arc(&self) -> Arc<Registries> {
        Arc::clone(&self.registries)
    }

    pub fn attach_registries(&mut self, registries: Arc<Registries>) {
        self.registries = registries;
    }

    pub fn floor(&self) -> &Floor {
        self.house.floor(self.floor).unwrap_or(&EMPTY_FLOOR)
    }

    /// Swaps the house. Entities stay where they are and LOS is rebuilt.
    pub fn load_house(&mut self, house: House) {
        debug!(target: "core::game", house = %house.name, "house loaded");
        self.house = house;
        self.floor = 0;
        self.refresh_los();
        self.push_event(GameEvent::ViewerRebuilt);
    }

    // ===== entities =====

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Entities that are not dead, in id order.
    pub fn living(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter().filter(|e| e.is_alive())
    }

    pub fn side_entities(&self, side: Side) -> impl Iterator<Item = &Entity> + '_ {
        self.living().filter(move |e| e.side() == side)
    }

    /// Living entity whose footprint covers `pos`.
    pub fn entity_at(&self, pos: BoardPos) -> Option<&Entity> {
        self.living().find(|e| e.footprint().contains(pos))
    }

    pub fn select(&mut self, id: Option<EntityId>) {
        for e in &mut self.entities {
            e.flags.set(EntityFlags::SELECTED, Some(e.id) == id);
        }
        self.selected = id;
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        let removed = self.entities.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.push_event(GameEvent::EntityRemoved(id));
        Some(removed)
    }

    /// Applies damage after resistances and handles death.
    pub fn damage_entity(&mut self, id: EntityId, amount: i32, kind: DamageKind) -> DamageOutcome {
        let Some(ent) = self.entity_mut(id) else {
            return DamageOutcome {
                dealt: 0,
                killed: false,
            };
        };
        let outcome = ent.stats.apply_damage(amount, kind);
        if outcome.dealt > 0 {
            self.push_event(GameEvent::Sprite {
                ent: id,
                command: SpriteCommand::Damaged,
            });
        }
        if outcome.killed {
            self.kill(id);
        }
        outcome
    }

    /// Marks an entity dead. It stays in the list for scripts to inspect.
    pub fn kill(&mut self, id: EntityId) {
        let Some(ent) = self.entity_mut(id) else {
            return;
        };
        ent.flags.insert(EntityFlags::DEAD);
        ent.ready = None;
        if let Some(los) = &mut ent.los {
            los.clear();
        }
        debug!(target: "core::game", entity = %id, "killed");
        self.push_event(GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Defend,
        });
        self.push_event(GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Killed,
        });
    }

    pub fn set_hp(&mut self, id: EntityId, hp: i32) -> bool {
        let Some(ent) = self.entity_mut(id) else {
            return false;
        };
        ent.stats.set_hp(hp);
        if ent.stats.is_dead() && !ent.flags.contains(EntityFlags::DEAD) {
            self.kill(id);
        }
        true
    }

    pub fn set_ap(&mut self, id: EntityId, ap: i32) -> bool {
        self.entity_mut(id)
            .map(|e| e.stats.set_ap(ap))
            .is_some()
    }

    /// Applies a registered condition. Unknown names are logged and ignored.
    pub fn apply_condition(&mut self, id: EntityId, name: &str) -> bool {
        let Some(def) = self.registries.condition(name).cloned() else {
            warn!(target: "core::game", condition = name, "unknown condition");
            return false;
        };
        self.entity_mut(id)
            .map(|e| e.stats.apply_condition(def))
            .is_some()
    }

    pub fn set_condition(&mut self, id: EntityId, name: &str, on: bool) -> bool {
        if on {
            return self.apply_condition(id, name);
        }
        self.entity_mut(id)
            .is_some_and(|e| e.stats.remove_condition(name))
    }

    /// Equips gear: its action joins the entity's list and its condition is
    /// applied. Replaces previously equipped gear's action.
    pub fn set_gear(&mut self, id: EntityId, name: &str) -> bool {
        let Some(gear) = self.registries.gear(name).cloned() else {
            warn!(target: "core::game", gear = name, "unknown gear");
            return false;
        };
        let registries = Arc::clone(&self.registries);
        let Some(ent) = self.entity_mut(id) else {
            return false;
        };
        if let Some(old) = ent.gear.take()
            && let Some(old_action) = registries.gear(&old).and_then(|g| g.action.as_ref())
            && let Some(i) = ent
                .actions
                .iter()
                .position(|a| a.name() == old_action.name())
        {
            ent.actions.remove(i);
        }
        if let Some(action) = gear.action {
            ent.actions.push(Action::from_def(action));
        }
        if let Some(condition) = gear.condition.as_ref().and_then(|c| registries.condition(c)) {
            ent.stats.apply_condition(condition.clone());
        }
        ent.gear = Some(gear.name);
        true
    }

    /// Ticks every condition of `side`'s entities once.
    pub fn tick_conditions(&mut self, side: Side) {
        let ids: Vec<EntityId> = self.side_entities(side).map(|e| e.id).collect();
        for id in ids {
            let killed = self
                .entity_mut(id)
                .map(|e| e.stats.on_round().iter().any(|o| o.killed))
                .unwrap_or(false);
            if killed {
                self.kill(id);
            }
        }
    }

    // ===== turn =====

    /// Side to move for the current turn.
    pub fn side_to_move(&self) -> Side {
        side_for_turn(self.first_side, self.turn)
    }

    // ===== PRNG =====

    /// Draw in `1..=n` from the game PRNG. The only source of randomness.
    pub fn rand(&mut self, n: i32) -> i32 {
        self.rng.rand(n)
    }

    pub(crate) fn rand_below(&mut self, n: u32) -> u32 {
        self.rng.below(n)
    }

    pub fn rng(&self) -> &GameRng {
        &self.rng
    }

    // ===== execs =====

    /// Execs committed since the turn started.
    pub fn exec_log(&self) -> &[ActionExec] {
        &self.exec_log
    }

    pub(crate) fn record_exec(&mut self, exec: ActionExec) {
        self.exec_log.push(exec);
    }

    pub(crate) fn clear_exec_log(&mut self) {
        self.exec_log.clear();
    }

    pub fn current_exec(&self) -> Option<&ActionExec> {
        self.current.as_ref().map(|run| &run.exec)
    }

    pub(crate) fn take_run(&mut self) -> Option<ExecRun> {
        self.current.take()
    }

    pub(crate) fn put_run(&mut self, run: ExecRun) {
        self.current = Some(run);
    }

    // ===== events =====

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn advance_frame(&mut self) {
        self.frame += 1;
    }

    /// Marks the scenario finished. Idempotent.
    pub fn end_game(&mut self) {
        if !self.ended {
            self.ended = true;
            self.push_event(GameEvent::GameEnded);
        }
    }

    // ===== persistence =====

    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveError> {
        bincode::serialize(self).map_err(|e| SaveError::Encode(e.to_string()))
    }

    /// Restores a game and rebuilds everything that is not serialized.
    pub fn from_bytes(bytes: &[u8], registries: Arc<Registries>) -> Result<Self, SaveError> {
        let mut game: Game =
            bincode::deserialize(bytes).map_err(|e| SaveError::Decode(e.to_string()))?;
        game.registries = registries;
        game.refresh_los();
        game.remap(Side::Intruders);
        game.remap(Side::Denizens);
        Ok(game)
    }

    /// SHA-256 of the canonical encoding, hex encoded.
    pub fn digest(&self) -> Result<String, SaveError> {
        let bytes = self.to_bytes()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::action::{ActionDef, BasicAttackDef, InteractDef, MoveDef, SummonDef};
    use crate::entity::{EntityDef, ExplorerDef, HauntDef, HauntLevel};
    use crate::house::tests::two_room_floor;
    use crate::house::{SpawnPoint, compile_pattern};
    use crate::stats::BaseStats;

    pub(crate) fn explorer(name: &str) -> EntityDef {
        let mut def = EntityDef::new(name);
        def.explorer = Some(ExplorerDef::default());
        def.sight = Some(6);
        def.actions = vec![
            ActionDef::Move(MoveDef {
                name: "Move".into(),
                ..MoveDef::default()
            }),
            ActionDef::BasicAttack(BasicAttackDef {
                name: "Pistol".into(),
                ap: 3,
                damage: 2,
                strength: 3,
                kind: DamageKind::Unspecified,
                range: 10,
                ammo: 0,
                conditions: Vec::new(),
                sounds: Default::default(),
            }),
            ActionDef::Interact(InteractDef {
                name: "Open".into(),
                ap: 1,
                range: 1,
                sounds: Default::default(),
            }),
        ];
        def
    }

    pub(crate) fn haunt(name: &str) -> EntityDef {
        let mut def = EntityDef::new(name);
        def.haunt = Some(HauntDef {
            level: HauntLevel::Servitor,
            cost: 1,
        });
        def.base = BaseStats {
            hp_max: 20,
            ..BaseStats::default()
        };
        def.actions = vec![
            ActionDef::Move(MoveDef {
                name: "Move".into(),
                ..MoveDef::default()
            }),
            ActionDef::Summon(SummonDef {
                name: "Call".into(),
                ap: 4,
                ent: "Shade".into(),
                range: 2,
                ammo: 2,
                personal_los: false,
                animation: String::new(),
                sounds: Default::default(),
            }),
        ];
        def
    }

    pub(crate) fn test_registries() -> Registries {
        let mut registries = Registries::default();
        registries.add_entity(explorer("Occultist"));
        registries.add_entity(explorer("Medium"));
        registries.add_entity(haunt("Poltergeist"));
        let mut shade = EntityDef::new("Shade");
        shade.haunt = Some(HauntDef::default());
        registries.add_entity(shade);
        registries
    }

    /// Two-room floor with spawn points covering each room.
    pub(crate) fn test_game() -> Game {
        let mut floor = two_room_floor();
        floor.spawns.push(SpawnPoint {
            name: "intruders-start".into(),
            x: 0,
            y: 0,
            dx: 10,
            dy: 4,
        });
        floor.spawns.push(SpawnPoint {
            name: "denizens-start".into(),
            x: 0,
            y: 4,
            dx: 10,
            dy: 4,
        });
        let house = House {
            name: "test".into(),
            floors: vec![floor],
        };
        Game::new(house, Arc::new(test_registries()), 100, Side::Intruders)
    }

    pub(crate) fn spawn(game: &mut Game, name: &str, x: i32, y: i32) -> EntityId {
        game.spawn_at(name, BoardPos::new(x, y)).unwrap()
    }

    #[test]
    fn ids_are_monotonic() {
        let mut game = test_game();
        let a = spawn(&mut game, "Occultist", 1, 1);
        game.remove_entity(a);
        let b = spawn(&mut game, "Occultist", 1, 1);
        assert!(b.0 > a.0);
    }

    #[test]
    fn dead_entities_stay_listed() {
        let mut game = test_game();
        let id = spawn(&mut game, "Occultist", 1, 1);
        let outcome = game.damage_entity(id, 50, DamageKind::Brutal);
        assert!(outcome.killed);
        assert_eq!(game.entities().len(), 1);
        assert!(game.entity_at(BoardPos::new(1, 1)).is_none());
        let events = game.drain_events();
        assert!(events.contains(&GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Killed
        }));
    }

    #[test]
    fn save_round_trip() {
        let mut game = test_game();
        let id = spawn(&mut game, "Occultist", 2, 2);
        game.rand(6);
        game.apply_condition(id, "FireDebuffAttack");
        let bytes = game.to_bytes().unwrap();

        let restored = Game::from_bytes(&bytes, game.registries_arc()).unwrap();
        assert_eq!(restored.digest().unwrap(), game.digest().unwrap());
        assert_eq!(restored.rng(), game.rng());
        let ent = restored.entity(id).unwrap();
        assert!(ent.stats.has_condition("FireDebuffAttack"));
        assert!(ent.los.as_ref().is_some_and(|l| !l.is_empty()));
    }

    #[test]
    fn placement_needs_matching_spawn() {
        let mut game = test_game();
        let pattern = compile_pattern("^denizens-").unwrap();
        let ent = game.make_entity("Poltergeist").unwrap();
        let placed = game.place_entity(ent, BoardPos::new(3, 5), &pattern);
        assert!(placed.is_some());

        let ent = game.make_entity("Occultist").unwrap();
        assert!(game.place_entity(ent, BoardPos::new(3, 1), &pattern).is_none());

        // Occupied cell.
        let pattern = compile_pattern("start").unwrap();
        let ent = game.make_entity("Medium").unwrap();
        assert!(game.place_entity(ent, BoardPos::new(3, 5), &pattern).is_none());
    }

    #[test]
    fn gear_adds_action() {
        let mut registries = test_registries();
        registries.add_gear(crate::entity::GearDef {
            name: "Lantern".into(),
            action: Some(ActionDef::Interact(InteractDef {
                name: "Shine".into(),
                ap: 2,
                range: 3,
                sounds: Default::default(),
            })),
            condition: Some("FireResistance".into()),
        });
        let mut game = test_game();
        game.attach_registries(Arc::new(registries));
        let id = spawn(&mut game, "Occultist", 2, 2);
        let before = game.entity(id).unwrap().actions.len();
        assert!(game.set_gear(id, "Lantern"));
        let ent = game.entity(id).unwrap();
        assert_eq!(ent.actions.len(), before + 1);
        assert!(ent.stats.has_condition("FireResistance"));
        assert!(!game.set_gear(id, "Nothing"));
    }

    #[test]
    fn conditions_tick_for_the_side_only() {
        let mut game = test_game();
        let a = spawn(&mut game, "Occultist", 2, 2);
        let d = spawn(&mut game, "Poltergeist", 2, 6);
        game.apply_condition(a, "FireDebuffAttack");
        game.apply_condition(d, "FireDebuffAttack");
        game.tick_conditions(Side::Intruders);
        assert_eq!(game.entity(a).unwrap().stats.hp_cur(), 9);
        assert_eq!(game.entity(d).unwrap().stats.hp_cur(), 20);
    }
}
