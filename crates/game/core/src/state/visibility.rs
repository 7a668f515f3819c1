//! Line of sight, doors and path planning over the game's floor.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{EMPTY_FLOOR, Game};
use crate::entity::{EntityId, Side};
use crate::events::GameEvent;
use crate::geom::{BoardPos, BoardRect};
use crate::house::Graph;
use crate::los::{LosData, LosMode, SideLos};

impl Game {
    /// Recomputes one entity's grid from its current cell.
    pub fn update_entity_los(&mut self, id: EntityId) {
        let floor = self.house.floors.get(self.floor).unwrap_or(&EMPTY_FLOOR);
        let Some(ent) = self.entities.iter_mut().find(|e| e.id == id) else {
            return;
        };
        if !ent.side().is_playing() {
            return;
        }
        let alive = ent.is_alive();
        let (pos, sight) = (ent.pos, ent.sight(&self.config));
        let los = ent.los.get_or_insert_with(LosData::default);
        if alive {
            los.compute(floor, pos, sight);
        } else {
            los.clear();
        }
    }

    /// Recomputes every entity's grid.
    pub fn refresh_los(&mut self) {
        let ids: Vec<EntityId> = self.entities.iter().map(|e| e.id).collect();
        for id in ids {
            self.update_entity_los(id);
        }
    }

    /// Any cell of `rect` visible to the entity.
    pub fn has_los(&self, id: EntityId, rect: &BoardRect) -> bool {
        self.entity(id).is_some_and(|e| e.has_los(rect))
    }

    pub fn side_los(&self, side: Side) -> Option<&SideLos> {
        match side {
            Side::Intruders => Some(&self.intruders_los),
            Side::Denizens => Some(&self.denizens_los),
            _ => None,
        }
    }

    fn side_los_mut(&mut self, side: Side) -> Option<&mut SideLos> {
        match side {
            Side::Intruders => Some(&mut self.intruders_los),
            Side::Denizens => Some(&mut self.denizens_los),
            _ => None,
        }
    }

    /// Any cell of `rect` visible to `side` as of its last remap.
    pub fn team_los(&self, side: Side, rect: &BoardRect) -> bool {
        self.side_los(side).is_some_and(|los| los.sees(rect))
    }

    pub fn set_los_mode(&mut self, side: Side, mode: LosMode, rooms: Vec<usize>) {
        if let Some(los) = self.side_los_mut(side) {
            debug!(target: "core::los", %side, %mode, "los mode");
            los.set_mode(mode, rooms);
        }
    }

    /// Rebuilds `side`'s texture from its entities' grids and queues a
    /// snapshot for the renderer. At most once per frame per side.
    pub fn remap(&mut self, side: Side) -> bool {
        let floor = self.house.floors.get(self.floor).unwrap_or(&EMPTY_FLOOR);
        let grids = self
            .entities
            .iter()
            .filter(|e| e.is_alive() && e.side() == side)
            .filter_map(|e| e.los.as_ref());
        let los = match side {
            Side::Intruders => &mut self.intruders_los,
            Side::Denizens => &mut self.denizens_los,
            _ => return false,
        };
        if !los.remap(self.frame, floor, grids) {
            return false;
        }
        let alpha = los.texture().snapshot();
        self.events.push(GameEvent::LosTexture { side, alpha });
        true
    }

    /// Flips a door pair and recomputes sight for everyone.
    pub fn toggle_door(&mut self, room: usize, door: usize) -> Option<bool> {
        let opened = self
            .floor()
            .rooms
            .get(room)?
            .doors
            .get(door)?
            .is_opened();
        self.set_door(room, door, !opened)
    }

    pub fn set_door(&mut self, room: usize, door: usize, opened: bool) -> Option<bool> {
        let index = self.floor;
        let state = self.house.floor_mut(index)?.set_door(room, door, opened)?;
        self.refresh_los();
        self.push_event(GameEvent::DoorToggled {
            room,
            door,
            opened: state,
        });
        Some(state)
    }

    /// Walking graph for `id`: other living entities block only when the
    /// entity's side can see them.
    pub fn graph_for(&self, id: EntityId) -> Graph<'_> {
        let side = self.entity(id).map(|e| e.side());
        let occupied: BTreeSet<BoardPos> = self
            .living()
            .filter(|e| e.id != id)
            .filter(|e| match side {
                Some(s) if s.is_playing() => e.side() == s || self.team_los(s, &e.footprint()),
                _ => true,
            })
            .flat_map(|e| e.footprint().cells().collect::<Vec<_>>())
            .collect();
        Graph::new(self.floor(), false, occupied)
    }

    /// Cheapest path for `id` to `to`, excluding its own cell.
    pub fn find_path(&self, id: EntityId, to: BoardPos) -> Option<(Vec<BoardPos>, i32)> {
        let from = self.entity(id)?.pos;
        self.graph_for(id).path(from, to)
    }

    /// Cells `id` can walk to for at most `budget` AP.
    pub fn reachable(&self, id: EntityId, budget: i32) -> BTreeMap<BoardPos, i32> {
        let Some(from) = self.entity(id).map(|e| e.pos) else {
            return BTreeMap::new();
        };
        self.graph_for(id).reach(from, budget)
    }
}
