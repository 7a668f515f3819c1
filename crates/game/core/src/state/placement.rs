//! Creating entities and putting them on the board.

use regex::Regex;
use tracing::{debug, warn};

use super::Game;
use crate::entity::{Entity, EntityDef, EntityId, Side};
use crate::events::{GameEvent, SpriteCommand};
use crate::geom::{BoardPos, BoardRect};
use crate::house::SpawnPoint;

impl Game {
    /// Stages a new entity from its registered definition. The id is taken
    /// from the game's counter; the entity is not on the board yet.
    pub fn make_entity(&mut self, name: &str) -> Option<Entity> {
        let Some(def) = self.registries().entity(name).cloned() else {
            warn!(target: "core::game", entity = name, "unknown entity definition");
            return None;
        };
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        Some(Entity::from_def(id, def))
    }

    /// Footprint inside a single room, clear of furniture and of every other
    /// living entity.
    pub fn can_place(&self, def: &EntityDef, pos: BoardPos, ignore: Option<EntityId>) -> bool {
        let footprint = Entity::footprint_at(def, pos);
        let floor = self.floor();
        let Some(room) = floor.room_at(pos) else {
            return false;
        };
        if !room.rect().contains_rect(&footprint)
            || footprint.cells().any(|c| floor.blocks_movement(c))
        {
            return false;
        }
        !self
            .living()
            .any(|e| Some(e.id) != ignore && e.footprint().overlaps(&footprint))
    }

    /// Places a staged entity at `pos` when the footprint is free and lies
    /// inside a spawn point matching `pattern`.
    pub fn place_entity(
        &mut self,
        entity: Entity,
        pos: BoardPos,
        pattern: &Regex,
    ) -> Option<EntityId> {
        let footprint = Entity::footprint_at(&entity.def, pos);
        let in_spawn = self
            .floor()
            .spawns_matching(pattern)
            .any(|sp| sp.rect().contains_rect(&footprint));
        if !in_spawn || !self.can_place(&entity.def, pos, None) {
            return None;
        }
        Some(self.add_placed(entity, pos))
    }

    /// Creates and places an entity at `pos` with no spawn-point requirement.
    pub fn spawn_at(&mut self, name: &str, pos: BoardPos) -> Option<EntityId> {
        let def = self.registries().entity(name)?;
        if !self.can_place(def, pos, None) {
            debug!(target: "core::game", entity = name, cell = %pos, "spawn cell unavailable");
            return None;
        }
        let entity = self.make_entity(name)?;
        Some(self.add_placed(entity, pos))
    }

    /// Places a new entity on a uniformly random free cell of `spawns`.
    ///
    /// Candidate cells are visited in spawn order, row-major within each
    /// spawn, and one is kept by reservoir sampling. With `hidden`, cells the
    /// opposing side can see are skipped.
    pub fn spawn_somewhere(
        &mut self,
        name: &str,
        spawns: &[SpawnPoint],
        hidden: bool,
    ) -> Option<EntityId> {
        let def = self.registries().entity(name)?.clone();
        let side = def.side();
        let mut chosen = None;
        let mut seen = 0u32;
        for sp in spawns {
            for pos in sp.rect().cells() {
                let footprint = Entity::footprint_at(&def, pos);
                if !sp.rect().contains_rect(&footprint) || !self.can_place(&def, pos, None) {
                    continue;
                }
                if hidden && self.seen_by_others(side, &footprint) {
                    continue;
                }
                seen += 1;
                if self.rand_below(seen) == 0 {
                    chosen = Some(pos);
                }
            }
        }
        let pos = chosen?;
        let entity = self.make_entity(name)?;
        Some(self.add_placed(entity, pos))
    }

    /// Moves a placed entity straight to `pos`, skipping movement rules.
    pub fn relocate(&mut self, id: EntityId, pos: BoardPos) -> bool {
        let Some(def) = self.entity(id).map(|e| e.def.clone()) else {
            return false;
        };
        if !self.can_place(&def, pos, Some(id)) {
            return false;
        }
        if let Some(ent) = self.entity_mut(id) {
            ent.set_pos(pos);
        }
        self.update_entity_los(id);
        self.push_event(GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Move(pos),
        });
        true
    }

    fn seen_by_others(&self, side: Side, rect: &BoardRect) -> bool {
        [Side::Intruders, Side::Denizens]
            .into_iter()
            .filter(|&other| other != side)
            .any(|other| self.team_los(other, rect))
    }

    fn add_placed(&mut self, mut entity: Entity, pos: BoardPos) -> EntityId {
        let id = entity.id;
        entity.set_pos(pos);
        debug!(target: "core::game", entity = %id, name = entity.name(), cell = %pos, "placed");
        self.entities.push(entity);
        self.update_entity_los(id);
        self.push_event(GameEvent::EntitySpawned(id));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{spawn, test_game};
    use super::*;

    #[test]
    fn footprint_must_stay_in_one_room() {
        let mut game = test_game();
        let mut registries = game.registries().clone();
        let mut wide = EntityDef::new("Wardrobe");
        wide.dx = 2;
        wide.dy = 2;
        registries.add_entity(wide);
        game.attach_registries(std::sync::Arc::new(registries));

        // Straddles the wall between the two rooms.
        assert!(game.spawn_at("Wardrobe", BoardPos::new(4, 3)).is_none());
        assert!(game.spawn_at("Wardrobe", BoardPos::new(4, 1)).is_some());
        assert!(game.spawn_at("Occultist", BoardPos::new(5, 2)).is_none());
    }

    #[test]
    fn spawn_somewhere_is_reproducible() {
        let spawns = |game: &Game| vec![game.floor().spawn("intruders-start").unwrap().clone()];
        let mut a = test_game();
        let mut b = test_game();
        let sa = spawns(&a);
        let sb = spawns(&b);
        let ia = a.spawn_somewhere("Medium", &sa, false).unwrap();
        let ib = b.spawn_somewhere("Medium", &sb, false).unwrap();
        assert_eq!(a.entity(ia).unwrap().pos, b.entity(ib).unwrap().pos);
        assert!(sa[0].contains(a.entity(ia).unwrap().pos));
    }

    #[test]
    fn hidden_spawn_avoids_enemy_sight() {
        let mut game = test_game();
        spawn(&mut game, "Occultist", 5, 2);
        game.advance_frame();
        game.remap(Side::Intruders);
        let room = vec![game.floor().spawn("intruders-start").unwrap().clone()];
        // The whole parlor is in sight, so a hidden denizen cannot appear there.
        assert!(game.spawn_somewhere("Poltergeist", &room, true).is_none());
        assert!(game.spawn_somewhere("Poltergeist", &room, false).is_some());
    }

    #[test]
    fn full_spawn_yields_nothing() {
        let mut game = test_game();
        let tiny = SpawnPoint {
            name: "closet".into(),
            x: 8,
            y: 1,
            dx: 1,
            dy: 1,
        };
        assert!(game.spawn_somewhere("Medium", &[tiny.clone()], false).is_some());
        assert!(game.spawn_somewhere("Medium", &[tiny], false).is_none());
    }

    #[test]
    fn relocate_respects_occupancy() {
        let mut game = test_game();
        let a = spawn(&mut game, "Occultist", 1, 1);
        let b = spawn(&mut game, "Medium", 3, 1);
        assert!(!game.relocate(a, BoardPos::new(3, 1)));
        assert!(game.relocate(a, BoardPos::new(2, 2)));
        assert_eq!(game.entity(a).unwrap().pos, BoardPos::new(2, 2));
        assert_eq!(game.entity(b).unwrap().pos, BoardPos::new(3, 1));
    }
}
