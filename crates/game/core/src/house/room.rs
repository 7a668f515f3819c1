use serde::{Deserialize, Serialize};

use super::SpatialError;
use crate::geom::{BoardPos, BoardRect};

/// Which wall of a room a door sits on.
///
/// "Left" walls run along the x axis, "right" walls along the y axis. Far
/// walls are the ones at the room's maximum edge (`y + dy` / `x + dx`), near
/// walls at its origin edge.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum DoorFacing {
    NearLeft,
    NearRight,
    FarLeft,
    FarRight,
}

impl DoorFacing {
    /// Facing of the matching door on the neighbouring room.
    pub const fn mirror(self) -> Self {
        match self {
            Self::NearLeft => Self::FarLeft,
            Self::FarLeft => Self::NearLeft,
            Self::NearRight => Self::FarRight,
            Self::FarRight => Self::NearRight,
        }
    }

    pub const fn is_far(self) -> bool {
        matches!(self, Self::FarLeft | Self::FarRight)
    }

    /// True for doors on walls that run along the x axis.
    pub const fn along_x(self) -> bool {
        matches!(self, Self::NearLeft | Self::FarLeft)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Door {
    pub facing: DoorFacing,
    /// Offset along the wall, relative to the room origin.
    pub pos: i32,
    pub width: i32,
    #[serde(default)]
    pub opened: bool,
}

impl Door {
    pub fn new(facing: DoorFacing, pos: i32, width: i32) -> Self {
        Self {
            facing,
            pos,
            width,
            opened: false,
        }
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// `(inside, outside)` cell pairs spanned by the door, in board space.
    pub fn crossings(&self, room: &Room) -> Vec<(BoardPos, BoardPos)> {
        (0..self.width.max(0))
            .map(|i| match self.facing {
                DoorFacing::FarLeft => {
                    let x = room.x + self.pos + i;
                    (
                        BoardPos::new(x, room.y + room.dy - 1),
                        BoardPos::new(x, room.y + room.dy),
                    )
                }
                DoorFacing::NearLeft => {
                    let x = room.x + self.pos + i;
                    (BoardPos::new(x, room.y), BoardPos::new(x, room.y - 1))
                }
                DoorFacing::FarRight => {
                    let y = room.y + self.pos + i;
                    (
                        BoardPos::new(room.x + room.dx - 1, y),
                        BoardPos::new(room.x + room.dx, y),
                    )
                }
                DoorFacing::NearRight => {
                    let y = room.y + self.pos + i;
                    (BoardPos::new(room.x, y), BoardPos::new(room.x - 1, y))
                }
            })
            .collect()
    }

    /// True when the door spans the step from `inside` (in `room`) to `outside`.
    pub fn covers(&self, room: &Room, inside: BoardPos, outside: BoardPos) -> bool {
        self.crossings(room)
            .into_iter()
            .any(|(a, b)| a == inside && b == outside)
    }

    /// True when the whole door fits on its wall.
    pub fn fits(&self, room: &Room) -> bool {
        let wall = if self.facing.along_x() { room.dx } else { room.dy };
        self.width > 0 && self.pos >= 0 && self.pos + self.width <= wall
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dims {
    pub dx: i32,
    pub dy: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Furniture {
    pub name: String,
    /// Room-relative origin.
    pub x: i32,
    pub y: i32,
    /// Index into `dims`; rotating a piece swaps which footprint is used.
    #[serde(default)]
    pub orientation: usize,
    #[serde(default)]
    pub dims: Vec<Dims>,
    #[serde(default)]
    pub blocks_los: bool,
}

impl Furniture {
    pub fn dims(&self) -> Dims {
        self.dims
            .get(self.orientation)
            .copied()
            .unwrap_or(Dims { dx: 1, dy: 1 })
    }

    /// Footprint in board space.
    pub fn rect(&self, room: &Room) -> BoardRect {
        let dims = self.dims();
        BoardRect::new(room.x + self.x, room.y + self.y, dims.dx, dims.dy)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
    pub furniture: Vec<Furniture>,
    pub doors: Vec<Door>,
    pub wall_decals: Vec<String>,
    pub floor_decals: Vec<String>,
}

impl Room {
    pub fn new(name: impl Into<String>, x: i32, y: i32, dx: i32, dy: i32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            dx,
            dy,
            furniture: Vec::new(),
            doors: Vec::new(),
            wall_decals: Vec::new(),
            floor_decals: Vec::new(),
        }
    }

    pub fn rect(&self) -> BoardRect {
        BoardRect::new(self.x, self.y, self.dx, self.dy)
    }

    pub fn contains(&self, pos: BoardPos) -> bool {
        self.rect().contains(pos)
    }

    pub fn furniture_at(&self, pos: BoardPos) -> Option<&Furniture> {
        self.furniture.iter().find(|f| f.rect(self).contains(pos))
    }

    /// Furniture must sit inside the room and never overlap.
    pub fn validate_furniture(&self) -> Result<(), SpatialError> {
        let room_rect = self.rect();
        for (i, piece) in self.furniture.iter().enumerate() {
            let rect = piece.rect(self);
            if !room_rect.contains_rect(&rect) {
                return Err(SpatialError::FurnitureOutsideRoom {
                    room: self.name.clone(),
                    furniture: piece.name.clone(),
                });
            }
            if let Some(other) = self.furniture[..i]
                .iter()
                .find(|other| other.rect(self).overlaps(&rect))
            {
                return Err(SpatialError::FurnitureOverlap {
                    room: self.name.clone(),
                    first: other.name.clone(),
                    second: piece.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Two orthogonally adjacent cells in different rooms are connected iff an
/// opened door on the shared wall covers the crossing.
pub fn connected(r1: &Room, r2: &Room, a: BoardPos, b: BoardPos) -> bool {
    if !r1.contains(a) || !r2.contains(b) || !a.is_adjacent(b) || a.is_diagonal_to(b) {
        return false;
    }
    r1.doors
        .iter()
        .any(|door| door.is_opened() && door.covers(r1, a, b))
        || r2
            .doors
            .iter()
            .any(|door| door.is_opened() && door.covers(r2, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(name: &str, x: i32, y: i32, dx: i32, dy: i32) -> Furniture {
        Furniture {
            name: name.into(),
            x,
            y,
            orientation: 0,
            dims: vec![Dims { dx, dy }, Dims { dx: dy, dy: dx }],
            blocks_los: true,
        }
    }

    #[test]
    fn far_left_door_crosses_to_next_row() {
        let room = Room::new("hall", 0, 0, 10, 4);
        let door = Door::new(DoorFacing::FarLeft, 5, 1);
        assert_eq!(
            door.crossings(&room),
            vec![(BoardPos::new(5, 3), BoardPos::new(5, 4))]
        );
    }

    #[test]
    fn orientation_selects_footprint() {
        let room = Room::new("study", 2, 2, 6, 6);
        let mut desk = piece("desk", 1, 1, 3, 1);
        assert_eq!(desk.rect(&room), BoardRect::new(3, 3, 3, 1));
        desk.orientation = 1;
        assert_eq!(desk.rect(&room), BoardRect::new(3, 3, 1, 3));
    }

    #[test]
    fn furniture_must_not_overlap_or_escape() {
        let mut room = Room::new("study", 0, 0, 4, 4);
        room.furniture.push(piece("desk", 0, 0, 2, 1));
        room.furniture.push(piece("chair", 1, 0, 1, 1));
        assert!(matches!(
            room.validate_furniture(),
            Err(SpatialError::FurnitureOverlap { .. })
        ));

        room.furniture.pop();
        room.furniture.push(piece("shelf", 3, 3, 2, 1));
        assert!(matches!(
            room.validate_furniture(),
            Err(SpatialError::FurnitureOutsideRoom { .. })
        ));
    }

    #[test]
    fn closed_door_does_not_connect() {
        let mut a = Room::new("a", 0, 0, 10, 4);
        let b = Room::new("b", 0, 4, 10, 4);
        a.doors.push(Door::new(DoorFacing::FarLeft, 5, 1));
        let (inside, outside) = (BoardPos::new(5, 3), BoardPos::new(5, 4));
        assert!(!connected(&a, &b, inside, outside));
        a.doors[0].opened = true;
        assert!(connected(&a, &b, inside, outside));
        assert!(!connected(&a, &b, BoardPos::new(4, 3), BoardPos::new(4, 4)));
    }
}
