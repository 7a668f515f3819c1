//! On-disk house and room documents.
//!
//! A `.room` file describes one room shape with its furniture; a `.house`
//! file places named rooms on floors and adds doors and spawn points.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Floor, House, Room, SpatialError, SpawnPoint};
use super::room::{Dims, Door, DoorFacing, Furniture};
use crate::config::GameConfig;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomDef {
    pub name: String,
    pub size: Dims,
    #[serde(default)]
    pub furniture: Vec<Furniture>,
    #[serde(default)]
    pub wall_decals: Vec<String>,
    #[serde(default)]
    pub floor_decals: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DoorDef {
    pub facing: DoorFacing,
    pub pos: i32,
    pub width: i32,
    #[serde(default)]
    pub opened: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomPlacement {
    pub room: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub doors: Vec<DoorDef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FloorDef {
    #[serde(default)]
    pub rooms: Vec<RoomPlacement>,
    #[serde(default)]
    pub spawns: Vec<SpawnPoint>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HouseDef {
    pub name: String,
    pub floors: Vec<FloorDef>,
}

impl HouseDef {
    /// Resolves room references, validates furniture and pairs doors.
    pub fn build(&self, rooms: &BTreeMap<String, RoomDef>) -> Result<House, SpatialError> {
        if self.floors.is_empty() {
            return Err(SpatialError::NoFloors(self.name.clone()));
        }
        if self.floors.len() > GameConfig::MAX_FLOORS {
            return Err(SpatialError::TooManyFloors(self.floors.len()));
        }

        let mut floors = Vec::with_capacity(self.floors.len());
        for floor_def in &self.floors {
            let mut floor = Floor::default();
            for placement in &floor_def.rooms {
                let def = rooms
                    .get(&placement.room)
                    .ok_or_else(|| SpatialError::UnknownRoom(placement.room.clone()))?;
                let mut room = Room::new(
                    def.name.clone(),
                    placement.x,
                    placement.y,
                    def.size.dx,
                    def.size.dy,
                );
                room.furniture = def.furniture.clone();
                room.wall_decals = def.wall_decals.clone();
                room.floor_decals = def.floor_decals.clone();
                room.doors = placement
                    .doors
                    .iter()
                    .map(|d| Door {
                        facing: d.facing,
                        pos: d.pos,
                        width: d.width,
                        opened: d.opened,
                    })
                    .collect();
                room.validate_furniture()?;
                floor.add_room(room)?;
            }
            floor.spawns = floor_def.spawns.clone();
            floor.normalize_doors();
            floors.push(floor);
        }

        Ok(House {
            name: self.name.clone(),
            floors,
        })
    }
}
