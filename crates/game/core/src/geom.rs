//! Board-space primitives.
//!
//! Board space is an integer grid; every cell on a floor is addressed by a
//! [`BoardPos`]. Floating positions only appear while an entity is
//! interpolating between two cells.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Integer cell coordinate on a floor.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub struct BoardPos {
    pub x: i32,
    pub y: i32,
}

impl BoardPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chessboard distance; the metric used for sight and weapon ranges.
    pub fn chebyshev(self, other: BoardPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn is_adjacent(self, other: BoardPos) -> bool {
        self.chebyshev(other) == 1
    }

    pub fn is_diagonal_to(self, other: BoardPos) -> bool {
        self.x != other.x && self.y != other.y
    }

    /// 8-way facing index (0 = +x, counter-clockwise) pointing at `target`.
    pub fn facing_towards(self, target: BoardPos) -> u8 {
        let dx = (target.x - self.x).signum();
        let dy = (target.y - self.y).signum();
        match (dx, dy) {
            (1, 0) => 0,
            (1, 1) => 1,
            (0, 1) => 2,
            (-1, 1) => 3,
            (-1, 0) => 4,
            (-1, -1) => 5,
            (0, -1) => 6,
            (1, -1) => 7,
            _ => 0,
        }
    }
}

impl fmt::Display for BoardPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for BoardPos {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Axis-aligned rectangle of cells: `[x, x+dx) × [y, y+dy)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoardRect {
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
}

impl BoardRect {
    pub const fn new(x: i32, y: i32, dx: i32, dy: i32) -> Self {
        Self { x, y, dx, dy }
    }

    pub const fn cell(pos: BoardPos) -> Self {
        Self::new(pos.x, pos.y, 1, 1)
    }

    pub fn is_empty(&self) -> bool {
        self.dx <= 0 || self.dy <= 0
    }

    pub fn contains(&self, pos: BoardPos) -> bool {
        pos.x >= self.x && pos.x < self.x + self.dx && pos.y >= self.y && pos.y < self.y + self.dy
    }

    pub fn contains_rect(&self, other: &BoardRect) -> bool {
        !other.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.x + other.dx <= self.x + self.dx
            && other.y + other.dy <= self.y + self.dy
    }

    pub fn overlaps(&self, other: &BoardRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.x + other.dx
            && other.x < self.x + self.dx
            && self.y < other.y + other.dy
            && other.y < self.y + self.dy
    }

    /// Cells in row-major order (y outer, x inner).
    pub fn cells(&self) -> impl Iterator<Item = BoardPos> + '_ {
        let (x0, dx) = (self.x, self.dx.max(0));
        (self.y..self.y + self.dy.max(0))
            .flat_map(move |y| (x0..x0 + dx).map(move |x| BoardPos::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_containment_and_overlap() {
        let room = BoardRect::new(0, 0, 10, 4);
        assert!(room.contains(BoardPos::new(9, 3)));
        assert!(!room.contains(BoardPos::new(10, 3)));
        assert!(room.contains_rect(&BoardRect::new(2, 1, 3, 3)));
        assert!(!room.contains_rect(&BoardRect::new(8, 1, 3, 1)));
        assert!(room.overlaps(&BoardRect::new(9, 3, 5, 5)));
        assert!(!room.overlaps(&BoardRect::new(10, 0, 1, 1)));
    }

    #[test]
    fn cells_walk_row_major() {
        let cells: Vec<_> = BoardRect::new(1, 1, 2, 2).cells().collect();
        assert_eq!(
            cells,
            vec![
                BoardPos::new(1, 1),
                BoardPos::new(2, 1),
                BoardPos::new(1, 2),
                BoardPos::new(2, 2)
            ]
        );
    }

    #[test]
    fn facing_covers_all_octants() {
        let origin = BoardPos::new(5, 5);
        assert_eq!(origin.facing_towards(BoardPos::new(9, 5)), 0);
        assert_eq!(origin.facing_towards(BoardPos::new(5, 9)), 2);
        assert_eq!(origin.facing_towards(BoardPos::new(1, 1)), 5);
    }
}
