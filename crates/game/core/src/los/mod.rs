//! Line of sight.
//!
//! Each sighted entity keeps a boolean grid of the cells it sees
//! ([`LosData`]). Grids are rebuilt by casting Bresenham rays from the
//! entity's cell to every cell on the perimeter of its sight square; a ray
//! stops at walls, closed doors and opaque furniture. Per side, the grids are
//! merged into an 8-bit [`LosTexture`] by [`SideLos::remap`].

mod texture;

pub use texture::LosTexture;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::geom::{BoardPos, BoardRect};
use crate::house::Floor;

/// Cells seen by one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LosData {
    size: usize,
    grid: Vec<bool>,
    min: BoardPos,
    max: BoardPos,
}

impl Default for LosData {
    fn default() -> Self {
        Self::new(GameConfig::LOS_TEXTURE_SIZE)
    }
}

impl LosData {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            grid: vec![false; size * size],
            min: BoardPos::new(i32::MAX, i32::MAX),
            max: BoardPos::new(i32::MIN, i32::MIN),
        }
    }

    fn index(&self, pos: BoardPos) -> Option<usize> {
        let size = self.size as i32;
        (pos.x >= 0 && pos.y >= 0 && pos.x < size && pos.y < size)
            .then(|| pos.x as usize + pos.y as usize * self.size)
    }

    pub fn clear(&mut self) {
        self.grid.fill(false);
        self.min = BoardPos::new(i32::MAX, i32::MAX);
        self.max = BoardPos::new(i32::MIN, i32::MIN);
    }

    fn mark(&mut self, pos: BoardPos) {
        if let Some(i) = self.index(pos) {
            self.grid[i] = true;
            self.min = BoardPos::new(self.min.x.min(pos.x), self.min.y.min(pos.y));
            self.max = BoardPos::new(self.max.x.max(pos.x), self.max.y.max(pos.y));
        }
    }

    pub fn sees(&self, pos: BoardPos) -> bool {
        self.index(pos).is_some_and(|i| self.grid[i])
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Bounding box of the seen cells, if any.
    pub fn bounds(&self) -> Option<BoardRect> {
        (!self.is_empty()).then(|| {
            BoardRect::new(
                self.min.x,
                self.min.y,
                self.max.x - self.min.x + 1,
                self.max.y - self.min.y + 1,
            )
        })
    }

    pub fn any_in(&self, rect: &BoardRect) -> bool {
        match self.bounds() {
            Some(bounds) if bounds.overlaps(rect) => rect.cells().any(|pos| self.sees(pos)),
            _ => false,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = BoardPos> + '_ {
        self.bounds()
            .into_iter()
            .flat_map(|b| b.cells().collect::<Vec<_>>())
            .filter(|pos| self.sees(*pos))
    }

    /// Rebuilds the grid for an observer at `origin` with sight `radius`.
    ///
    /// Observers off the board, outside every room or with a negative radius
    /// see nothing.
    pub fn compute(&mut self, floor: &Floor, origin: BoardPos, radius: i32) {
        self.clear();
        if radius < 0 || self.index(origin).is_none() || floor.room_at(origin).is_none() {
            return;
        }
        self.mark(origin);
        for target in perimeter(origin, radius) {
            self.cast(floor, origin, target);
        }
    }

    fn cast(&mut self, floor: &Floor, origin: BoardPos, target: BoardPos) {
        let mut prev = origin;
        for cell in bresenham(origin, target).into_iter().skip(1) {
            if self.index(cell).is_none() || !floor.los_step(prev, cell) {
                return;
            }
            self.mark(cell);
            if floor.blocks_los(cell) {
                return;
            }
            prev = cell;
        }
    }
}

/// Cells on the border of the square of half-width `radius` around `origin`.
fn perimeter(origin: BoardPos, radius: i32) -> Vec<BoardPos> {
    if radius == 0 {
        return Vec::new();
    }
    let mut cells = Vec::with_capacity(8 * radius as usize);
    for d in -radius..=radius {
        cells.push(origin.offset(d, -radius));
        cells.push(origin.offset(d, radius));
    }
    for d in -radius + 1..radius {
        cells.push(origin.offset(-radius, d));
        cells.push(origin.offset(radius, d));
    }
    cells
}

/// Integer line from `from` to `to`, both ends included.
pub fn bresenham(from: BoardPos, to: BoardPos) -> Vec<BoardPos> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (from.x, from.y);
    let mut out = Vec::with_capacity(dx.max(-dy) as usize + 1);
    loop {
        out.push(BoardPos::new(x, y));
        if x == to.x && y == to.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    out
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum LosMode {
    /// Texture is left as it is.
    None,
    /// Nothing is visible.
    Blind,
    /// Everything is visible.
    All,
    /// Union of the side's entity grids.
    #[default]
    Entities,
    /// Every cell of the configured rooms.
    Rooms,
}

/// Visibility state of one side.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SideLos {
    pub mode: LosMode,
    /// Room indices used by [`LosMode::Rooms`].
    pub rooms: Vec<usize>,
    #[serde(skip)]
    texture: LosTexture,
    #[serde(skip)]
    remapped_frame: Option<u64>,
}

impl SideLos {
    pub fn texture(&self) -> &LosTexture {
        &self.texture
    }

    pub fn set_mode(&mut self, mode: LosMode, rooms: Vec<usize>) {
        self.mode = mode;
        self.rooms = rooms;
    }

    /// Any cell of `rect` visible to the side as of the last remap.
    pub fn sees(&self, rect: &BoardRect) -> bool {
        self.texture.any_visible(rect)
    }

    /// Rebuilds the texture from `grids`. At most once per `frame`; returns
    /// whether the texture was rebuilt.
    ///
    /// Cells seen earlier but not now keep `MIN_VISIBILITY` so explored rooms
    /// stay dimly drawn.
    pub fn remap<'a>(
        &mut self,
        frame: u64,
        floor: &Floor,
        grids: impl Iterator<Item = &'a LosData>,
    ) -> bool {
        if self.remapped_frame == Some(frame) {
            return false;
        }
        self.remapped_frame = Some(frame);

        match self.mode {
            LosMode::None => {}
            LosMode::Blind => self.texture.fill(0),
            LosMode::All => self.texture.fill(u8::MAX),
            LosMode::Rooms => {
                self.texture.fill(0);
                for room in self.rooms.iter().filter_map(|&i| floor.rooms.get(i)) {
                    for pos in room.rect().cells() {
                        self.texture.set(pos, u8::MAX);
                    }
                }
            }
            LosMode::Entities => {
                let mut seen = LosData::new(self.texture.size());
                for grid in grids {
                    for pos in grid.cells() {
                        seen.mark(pos);
                    }
                }
                let size = self.texture.size() as i32;
                for pos in BoardRect::new(0, 0, size, size).cells() {
                    let alpha = if seen.sees(pos) {
                        u8::MAX
                    } else if self.texture.get(pos) >= GameConfig::MIN_VISIBILITY {
                        GameConfig::MIN_VISIBILITY
                    } else {
                        0
                    };
                    self.texture.set(pos, alpha);
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::house::tests::two_room_floor;
    use crate::house::{Dims, Floor, Furniture, Room};

    #[test]
    fn bresenham_hits_both_ends() {
        let line = bresenham(BoardPos::new(2, 2), BoardPos::new(8, 6));
        assert_eq!(line.first(), Some(&BoardPos::new(2, 2)));
        assert_eq!(line.last(), Some(&BoardPos::new(8, 6)));
        assert_eq!(line.len(), 7);
    }

    #[test]
    fn closed_door_blocks_sight() {
        let mut floor = two_room_floor();
        let mut los = LosData::default();
        los.compute(&floor, BoardPos::new(2, 2), 6);
        assert!(los.sees(BoardPos::new(8, 3)));
        assert!(!los.sees(BoardPos::new(8, 6)));

        floor.set_door(0, 0, true);
        los.compute(&floor, BoardPos::new(2, 2), 6);
        assert!(los.sees(BoardPos::new(8, 6)));
    }

    #[test]
    fn opaque_furniture_is_seen_but_hides_what_is_behind() {
        let mut floor = Floor::default();
        let mut room = Room::new("gallery", 0, 0, 12, 3);
        room.furniture.push(Furniture {
            name: "wardrobe".into(),
            x: 4,
            y: 1,
            orientation: 0,
            dims: vec![Dims { dx: 1, dy: 1 }],
            blocks_los: true,
        });
        floor.add_room(room).unwrap();
        let mut los = LosData::default();
        los.compute(&floor, BoardPos::new(1, 1), 8);
        assert!(los.sees(BoardPos::new(4, 1)));
        assert!(!los.sees(BoardPos::new(6, 1)));
    }

    #[test]
    fn lone_room_observer_sees_only_its_room() {
        let mut floor = Floor::default();
        floor.add_room(Room::new("closet", 10, 10, 3, 3)).unwrap();
        floor.add_room(Room::new("beyond", 13, 10, 5, 3)).unwrap();
        let mut los = LosData::default();
        los.compute(&floor, BoardPos::new(12, 11), 5);
        assert!(los.cells().all(|pos| floor.rooms[0].contains(pos)));
        assert_eq!(los.cells().count(), 9);
    }

    #[test]
    fn degenerate_observers_see_nothing() {
        let floor = two_room_floor();
        let mut los = LosData::default();
        los.compute(&floor, BoardPos::new(2, 2), -1);
        assert!(los.is_empty());
        los.compute(&floor, BoardPos::new(500, 2), 4);
        assert!(los.is_empty());
        los.compute(&floor, BoardPos::new(50, 50), 4);
        assert!(los.is_empty());
    }

    #[test]
    fn remap_is_throttled_per_frame() {
        let floor = two_room_floor();
        let mut grid = LosData::default();
        grid.compute(&floor, BoardPos::new(2, 2), 3);
        let mut side = SideLos::default();
        assert!(side.remap(1, &floor, std::iter::once(&grid)));
        assert!(!side.remap(1, &floor, std::iter::once(&grid)));
        assert!(side.sees(&BoardRect::new(3, 3, 1, 1)));

        grid.clear();
        assert!(side.remap(2, &floor, std::iter::once(&grid)));
        assert!(!side.sees(&BoardRect::new(3, 3, 1, 1)));
        assert_eq!(
            side.texture().get(BoardPos::new(3, 3)),
            GameConfig::MIN_VISIBILITY
        );
    }

    #[test]
    fn modes_override_entity_union() {
        let floor = two_room_floor();
        let mut side = SideLos::default();
        side.set_mode(LosMode::Rooms, vec![1]);
        side.remap(1, &floor, std::iter::empty());
        assert!(side.sees(&BoardRect::new(0, 4, 1, 1)));
        assert!(!side.sees(&BoardRect::new(0, 0, 1, 1)));

        side.set_mode(LosMode::All, Vec::new());
        side.remap(2, &floor, std::iter::empty());
        assert!(side.sees(&BoardRect::new(100, 100, 1, 1)));

        side.set_mode(LosMode::Blind, Vec::new());
        side.remap(3, &floor, std::iter::empty());
        assert!(!side.sees(&BoardRect::new(0, 4, 1, 1)));
        assert_eq!("rooms".parse::<LosMode>().unwrap(), LosMode::Rooms);
    }
}
