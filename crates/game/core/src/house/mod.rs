//! Spatial model: houses, floors, rooms, doors, furniture and spawn points.
//!
//! Everything here is static during play except door state. Queries take
//! board cells and answer from the room list; nothing is cached per cell.

mod def;
mod graph;
mod room;
mod spawn;
mod view;

pub use def::{DoorDef, FloorDef, HouseDef, RoomDef, RoomPlacement};
pub use graph::Graph;
pub use room::{Dims, Door, DoorFacing, Furniture, Room, connected};
pub use spawn::{SpawnPatterns, SpawnPoint, compile_pattern};
pub use view::{Surface, SurfaceHit, Viewer};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::{ErrorSeverity, GameError};
use crate::geom::{BoardPos, BoardRect};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("house {0:?} is not registered")]
    UnknownHouse(String),

    #[error("room {0:?} is not registered")]
    UnknownRoom(String),

    #[error("house {0:?} has no floors")]
    NoFloors(String),

    #[error("{0} floors exceed the supported maximum")]
    TooManyFloors(usize),

    #[error("room {0:?} does not fit on the board")]
    RoomOutOfBounds(String),

    #[error("rooms {first:?} and {second:?} overlap")]
    RoomOverlap { first: String, second: String },

    #[error("furniture {furniture:?} does not fit inside room {room:?}")]
    FurnitureOutsideRoom { room: String, furniture: String },

    #[error("furniture {second:?} overlaps {first:?} in room {room:?}")]
    FurnitureOverlap {
        room: String,
        first: String,
        second: String,
    },

    #[error("invalid spawn pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl GameError for SpatialError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownHouse(_) | Self::UnknownRoom(_) => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownHouse(_) => "SPATIAL_UNKNOWN_HOUSE",
            Self::UnknownRoom(_) => "SPATIAL_UNKNOWN_ROOM",
            Self::NoFloors(_) => "SPATIAL_NO_FLOORS",
            Self::TooManyFloors(_) => "SPATIAL_TOO_MANY_FLOORS",
            Self::RoomOutOfBounds(_) => "SPATIAL_ROOM_OUT_OF_BOUNDS",
            Self::RoomOverlap { .. } => "SPATIAL_ROOM_OVERLAP",
            Self::FurnitureOutsideRoom { .. } => "SPATIAL_FURNITURE_OUTSIDE",
            Self::FurnitureOverlap { .. } => "SPATIAL_FURNITURE_OVERLAP",
            Self::InvalidPattern { .. } => "SPATIAL_INVALID_PATTERN",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub name: String,
    pub floors: Vec<Floor>,
}

impl House {
    /// A house with a single empty floor.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            floors: vec![Floor::default()],
        }
    }

    pub fn floor(&self, index: usize) -> Option<&Floor> {
        self.floors.get(index)
    }

    pub fn floor_mut(&mut self, index: usize) -> Option<&mut Floor> {
        self.floors.get_mut(index)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Floor {
    pub rooms: Vec<Room>,
    pub spawns: Vec<SpawnPoint>,
}

impl Floor {
    fn board() -> BoardRect {
        let size = GameConfig::LOS_TEXTURE_SIZE as i32;
        BoardRect::new(0, 0, size, size)
    }

    /// Adds a room, rejecting ones that leave the board or overlap others.
    pub fn add_room(&mut self, room: Room) -> Result<usize, SpatialError> {
        if !Self::board().contains_rect(&room.rect()) {
            return Err(SpatialError::RoomOutOfBounds(room.name));
        }
        if let Some(other) = self.rooms.iter().find(|r| r.rect().overlaps(&room.rect())) {
            return Err(SpatialError::RoomOverlap {
                first: other.name.clone(),
                second: room.name,
            });
        }
        self.rooms.push(room);
        Ok(self.rooms.len() - 1)
    }

    pub fn room_index_at(&self, pos: BoardPos) -> Option<usize> {
        self.rooms.iter().position(|room| room.contains(pos))
    }

    pub fn room_at(&self, pos: BoardPos) -> Option<&Room> {
        self.room_index_at(pos).map(|i| &self.rooms[i])
    }

    pub fn furniture_at(&self, pos: BoardPos) -> Option<&Furniture> {
        self.room_at(pos).and_then(|room| room.furniture_at(pos))
    }

    pub fn spawn_at(&self, pos: BoardPos) -> Option<&SpawnPoint> {
        self.spawns.iter().find(|sp| sp.contains(pos))
    }

    pub fn room_furn_spawn_at(
        &self,
        pos: BoardPos,
    ) -> (Option<&Room>, Option<&Furniture>, Option<&SpawnPoint>) {
        let room = self.room_at(pos);
        let furniture = room.and_then(|r| r.furniture_at(pos));
        (room, furniture, self.spawn_at(pos))
    }

    pub fn spawn(&self, name: &str) -> Option<&SpawnPoint> {
        self.spawns.iter().find(|sp| sp.name == name)
    }

    pub fn spawns_matching<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = &'a SpawnPoint> {
        self.spawns.iter().filter(move |sp| pattern.is_match(&sp.name))
    }

    /// Opaque furniture stops sight at its cell.
    pub fn blocks_los(&self, pos: BoardPos) -> bool {
        self.furniture_at(pos).is_some_and(|f| f.blocks_los)
    }

    /// Cells outside every room and cells under any furniture block movement.
    pub fn blocks_movement(&self, pos: BoardPos) -> bool {
        match self.room_at(pos) {
            Some(room) => room.furniture_at(pos).is_some(),
            None => true,
        }
    }

    fn orth_connected(&self, a: BoardPos, b: BoardPos) -> bool {
        match (self.room_index_at(a), self.room_index_at(b)) {
            (Some(i), Some(j)) if i == j => a.is_adjacent(b) && !a.is_diagonal_to(b),
            (Some(i), Some(j)) => connected(&self.rooms[i], &self.rooms[j], a, b),
            _ => false,
        }
    }

    /// Whether sight passes from `a` to the adjacent cell `b`.
    ///
    /// A diagonal step passes when either orthogonal detour does.
    pub fn los_step(&self, a: BoardPos, b: BoardPos) -> bool {
        if !a.is_adjacent(b) {
            return false;
        }
        if !a.is_diagonal_to(b) {
            return self.orth_connected(a, b);
        }
        [BoardPos::new(b.x, a.y), BoardPos::new(a.x, b.y)]
            .into_iter()
            .any(|c| self.orth_connected(a, c) && !self.blocks_los(c) && self.orth_connected(c, b))
    }

    /// Whether a walker may step from `a` to the adjacent cell `b`.
    ///
    /// Diagonal steps never cut corners: both detours must be walkable.
    pub fn move_step(&self, a: BoardPos, b: BoardPos) -> bool {
        if !a.is_adjacent(b) {
            return false;
        }
        if !a.is_diagonal_to(b) {
            return self.orth_connected(a, b);
        }
        [BoardPos::new(b.x, a.y), BoardPos::new(a.x, b.y)]
            .into_iter()
            .all(|c| {
                self.orth_connected(a, c) && !self.blocks_movement(c) && self.orth_connected(c, b)
            })
    }

    fn neighbour_across(&self, room: usize, door: &Door) -> Option<usize> {
        let crossings = door.crossings(&self.rooms[room]);
        let (_, first_outside) = *crossings.first()?;
        let neighbour = self.room_index_at(first_outside)?;
        crossings
            .iter()
            .all(|(_, outside)| self.rooms[neighbour].contains(*outside))
            .then_some(neighbour)
    }

    /// Pairs every far-wall door with a mirror door on the room across it and
    /// prunes doors that lead nowhere or have no partner.
    pub fn normalize_doors(&mut self) {
        for room in &mut self.rooms {
            let snapshot = room.clone();
            room.doors.retain(|door| door.fits(&snapshot));
        }

        // Far doors: drop when nothing is across, otherwise ensure the mirror.
        for i in 0..self.rooms.len() {
            let doors = std::mem::take(&mut self.rooms[i].doors);
            let mut kept = Vec::with_capacity(doors.len());
            for door in doors {
                if !door.facing.is_far() {
                    kept.push(door);
                    continue;
                }
                let Some(j) = self.neighbour_across(i, &door) else {
                    tracing::debug!(
                        target: "core::house",
                        room = %self.rooms[i].name,
                        facing = %door.facing,
                        "pruning door with no neighbouring room"
                    );
                    continue;
                };
                let mirror = Door {
                    facing: door.facing.mirror(),
                    pos: if door.facing.along_x() {
                        self.rooms[i].x + door.pos - self.rooms[j].x
                    } else {
                        self.rooms[i].y + door.pos - self.rooms[j].y
                    },
                    width: door.width,
                    opened: door.opened,
                };
                let neighbour = &mut self.rooms[j];
                match neighbour
                    .doors
                    .iter_mut()
                    .find(|d| d.facing == mirror.facing && d.pos == mirror.pos)
                {
                    Some(existing) => {
                        existing.width = mirror.width;
                        existing.opened = mirror.opened;
                    }
                    None => neighbour.doors.push(mirror),
                }
                kept.push(door);
            }
            self.rooms[i].doors = kept;
        }

        // Near doors survive only with a far partner.
        for j in 0..self.rooms.len() {
            let doors = std::mem::take(&mut self.rooms[j].doors);
            let kept = doors
                .into_iter()
                .filter(|door| door.facing.is_far() || self.has_partner(j, door))
                .collect();
            self.rooms[j].doors = kept;
        }
    }

    fn has_partner(&self, room: usize, door: &Door) -> bool {
        let Some(other) = self.neighbour_across(room, door) else {
            return false;
        };
        let mine = door.crossings(&self.rooms[room]);
        self.rooms[other].doors.iter().any(|candidate| {
            candidate.facing == door.facing.mirror()
                && candidate.width == door.width
                && candidate
                    .crossings(&self.rooms[other])
                    .iter()
                    .all(|(inside, outside)| mine.contains(&(*outside, *inside)))
        })
    }

    /// Every door has exactly one mirror partner across its wall.
    pub fn doors_paired(&self) -> bool {
        self.rooms.iter().enumerate().all(|(i, room)| {
            room.doors.iter().all(|door| self.has_partner(i, door))
        })
    }

    /// Opens or closes a door and its mirror. Returns the new state.
    pub fn set_door(&mut self, room: usize, door: usize, opened: bool) -> Option<bool> {
        let target = self.rooms.get(room)?.doors.get(door)?.clone();
        let crossings = target.crossings(&self.rooms[room]);
        let other = self.neighbour_across(room, &target);
        self.rooms[room].doors[door].opened = opened;
        if let Some(j) = other {
            let partner = self.rooms[j].doors.iter().position(|candidate| {
                candidate.facing == target.facing.mirror()
                    && candidate
                        .crossings(&self.rooms[j])
                        .iter()
                        .all(|(inside, outside)| crossings.contains(&(*outside, *inside)))
            });
            if let Some(k) = partner {
                self.rooms[j].doors[k].opened = opened;
            }
        }
        Some(opened)
    }

    /// Door whose crossing touches `pos` from either side: `(room, door)`.
    pub fn door_at(&self, pos: BoardPos) -> Option<(usize, usize)> {
        self.rooms.iter().enumerate().find_map(|(i, room)| {
            room.doors
                .iter()
                .position(|door| {
                    door.crossings(room)
                        .iter()
                        .any(|(inside, outside)| *inside == pos || *outside == pos)
                })
                .map(|d| (i, d))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two stacked 10×4 rooms with one door at x = 5 on the shared wall.
    pub(crate) fn two_room_floor() -> Floor {
        let mut floor = Floor::default();
        let mut lower = Room::new("parlor", 0, 0, 10, 4);
        lower.doors.push(Door::new(DoorFacing::FarLeft, 5, 1));
        floor.add_room(lower).unwrap();
        floor.add_room(Room::new("hall", 0, 4, 10, 4)).unwrap();
        floor.normalize_doors();
        floor
    }

    #[test]
    fn normalize_creates_mirror_door() {
        let floor = two_room_floor();
        assert_eq!(floor.rooms[1].doors.len(), 1);
        let mirror = &floor.rooms[1].doors[0];
        assert_eq!(mirror.facing, DoorFacing::NearLeft);
        assert_eq!(mirror.pos, 5);
        assert!(floor.doors_paired());
    }

    #[test]
    fn normalize_prunes_orphans() {
        let mut floor = Floor::default();
        let mut room = Room::new("attic", 0, 0, 6, 6);
        room.doors.push(Door::new(DoorFacing::FarRight, 2, 1));
        room.doors.push(Door::new(DoorFacing::NearLeft, 1, 1));
        room.doors.push(Door::new(DoorFacing::FarLeft, 5, 3));
        floor.add_room(room).unwrap();
        floor.normalize_doors();
        assert!(floor.rooms[0].doors.is_empty());
    }

    #[test]
    fn set_door_toggles_both_sides() {
        let mut floor = two_room_floor();
        let (a, b) = (BoardPos::new(5, 3), BoardPos::new(5, 4));
        assert!(!floor.move_step(a, b));
        floor.set_door(0, 0, true);
        assert!(floor.rooms[1].doors[0].opened);
        assert!(floor.move_step(a, b));
        assert!(floor.move_step(b, a));
        assert_eq!(floor.door_at(b), Some((0, 0)));
    }

    #[test]
    fn rooms_may_not_overlap() {
        let mut floor = Floor::default();
        floor.add_room(Room::new("a", 0, 0, 5, 5)).unwrap();
        assert!(matches!(
            floor.add_room(Room::new("b", 4, 4, 5, 5)),
            Err(SpatialError::RoomOverlap { .. })
        ));
        assert!(matches!(
            floor.add_room(Room::new("c", 126, 0, 5, 5)),
            Err(SpatialError::RoomOutOfBounds(_))
        ));
    }

    #[test]
    fn room_furniture_spawn_lookup() {
        let mut floor = two_room_floor();
        floor.rooms[0].furniture.push(Furniture {
            name: "piano".into(),
            x: 1,
            y: 1,
            orientation: 0,
            dims: vec![Dims { dx: 2, dy: 1 }],
            blocks_los: true,
        });
        floor.spawns.push(SpawnPoint {
            name: "intruders-start".into(),
            x: 0,
            y: 0,
            dx: 3,
            dy: 3,
        });
        let (room, furniture, spawn) = floor.room_furn_spawn_at(BoardPos::new(2, 1));
        assert_eq!(room.map(|r| r.name.as_str()), Some("parlor"));
        assert_eq!(furniture.map(|f| f.name.as_str()), Some("piano"));
        assert_eq!(spawn.map(|s| s.name.as_str()), Some("intruders-start"));
        assert!(floor.blocks_los(BoardPos::new(2, 1)));
        assert!(floor.blocks_movement(BoardPos::new(20, 20)));

        let pattern = compile_pattern("^intruders").unwrap();
        assert_eq!(floor.spawns_matching(&pattern).count(), 1);
    }
}
