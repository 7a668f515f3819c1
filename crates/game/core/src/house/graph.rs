//! The board as a graph for path planning.

use std::collections::{BTreeMap, BTreeSet};

use arrayvec::ArrayVec;
use pathfinding::prelude::{dijkstra, dijkstra_all};

use super::Floor;
use crate::config::GameConfig;
use crate::geom::BoardPos;

const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

/// Cells as vertices, steps between adjacent walkable cells as edges.
///
/// With `los = true` the graph describes what sight can cross: only opaque
/// furniture blocks and entities are ignored. Otherwise it is the walking
/// graph, where all furniture and the `occupied` cells block.
pub struct Graph<'a> {
    floor: &'a Floor,
    los: bool,
    occupied: BTreeSet<BoardPos>,
}

impl<'a> Graph<'a> {
    pub fn new(floor: &'a Floor, los: bool, occupied: BTreeSet<BoardPos>) -> Self {
        Self {
            floor,
            los,
            occupied,
        }
    }

    pub const fn num_vertex() -> usize {
        GameConfig::LOS_TEXTURE_SIZE * GameConfig::LOS_TEXTURE_SIZE
    }

    pub fn vertex(pos: BoardPos) -> Option<usize> {
        let size = GameConfig::LOS_TEXTURE_SIZE as i32;
        (pos.x >= 0 && pos.y >= 0 && pos.x < size && pos.y < size)
            .then(|| (pos.x + pos.y * size) as usize)
    }

    pub fn pos(vertex: usize) -> BoardPos {
        let size = GameConfig::LOS_TEXTURE_SIZE;
        BoardPos::new((vertex % size) as i32, (vertex / size) as i32)
    }

    pub fn passable(&self, pos: BoardPos) -> bool {
        if Self::vertex(pos).is_none() || self.floor.room_at(pos).is_none() {
            return false;
        }
        if self.los {
            !self.floor.blocks_los(pos)
        } else {
            !self.floor.blocks_movement(pos) && !self.occupied.contains(&pos)
        }
    }

    fn step(&self, a: BoardPos, b: BoardPos) -> bool {
        if self.los {
            self.floor.los_step(a, b)
        } else {
            self.floor.move_step(a, b)
        }
    }

    /// Neighbours of `vertex` with their step costs.
    pub fn adjacency(&self, vertex: usize) -> ArrayVec<(usize, i32), 8> {
        let from = Self::pos(vertex);
        let mut out = ArrayVec::new();
        for (dx, dy) in NEIGHBOUR_OFFSETS {
            let to = from.offset(dx, dy);
            if self.passable(to)
                && self.step(from, to)
                && let Some(v) = Self::vertex(to)
            {
                out.push((v, GameConfig::STEP_COST));
            }
        }
        out
    }

    fn successors(&self, pos: &BoardPos) -> Vec<(BoardPos, i32)> {
        Self::vertex(*pos)
            .map(|v| {
                self.adjacency(v)
                    .into_iter()
                    .map(|(n, cost)| (Self::pos(n), cost))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Cheapest path from `from` to `to`, excluding the start cell.
    pub fn path(&self, from: BoardPos, to: BoardPos) -> Option<(Vec<BoardPos>, i32)> {
        let (mut cells, cost) = dijkstra(&from, |p| self.successors(p), |p| *p == to)?;
        cells.remove(0);
        Some((cells, cost))
    }

    /// Every cell reachable from `from` for at most `budget`, with its cost.
    pub fn reach(&self, from: BoardPos, budget: i32) -> BTreeMap<BoardPos, i32> {
        dijkstra_all(&from, |p| self.successors(p))
            .into_iter()
            .filter_map(|(pos, (_, cost))| (cost <= budget).then_some((pos, cost)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::house::tests::two_room_floor;

    #[test]
    fn vertex_round_trip() {
        let pos = BoardPos::new(17, 3);
        let v = Graph::vertex(pos).unwrap();
        assert_eq!(Graph::pos(v), pos);
        assert!(Graph::vertex(BoardPos::new(-1, 0)).is_none());
        assert_eq!(Graph::num_vertex(), 128 * 128);
    }

    #[test]
    fn closed_door_splits_graph() {
        let mut floor = two_room_floor();
        let graph = Graph::new(&floor, false, BTreeSet::new());
        assert!(graph.path(BoardPos::new(1, 1), BoardPos::new(1, 6)).is_none());

        floor.set_door(0, 0, true);
        let graph = Graph::new(&floor, false, BTreeSet::new());
        let (path, cost) = graph.path(BoardPos::new(5, 1), BoardPos::new(5, 6)).unwrap();
        assert_eq!(cost, 5);
        assert_eq!(path.last(), Some(&BoardPos::new(5, 6)));
        assert!(path.contains(&BoardPos::new(5, 3)) && path.contains(&BoardPos::new(5, 4)));
    }

    #[test]
    fn occupied_cells_are_avoided() {
        let floor = two_room_floor();
        let blocked: BTreeSet<_> = (0..4).map(|y| BoardPos::new(3, y)).collect();
        let graph = Graph::new(&floor, false, blocked);
        assert!(graph.path(BoardPos::new(1, 1), BoardPos::new(6, 1)).is_none());
        let reach = graph.reach(BoardPos::new(1, 1), 1);
        assert!(reach.contains_key(&BoardPos::new(2, 2)));
        assert!(!reach.contains_key(&BoardPos::new(3, 2)));
    }

    #[test]
    fn diagonal_steps_do_not_cut_corners() {
        let mut floor = two_room_floor();
        floor.rooms[0].furniture.push(crate::house::Furniture {
            name: "chest".into(),
            x: 2,
            y: 1,
            orientation: 0,
            dims: vec![],
            blocks_los: false,
        });
        let graph = Graph::new(&floor, false, BTreeSet::new());
        let from = Graph::vertex(BoardPos::new(1, 1)).unwrap();
        let diagonal = Graph::vertex(BoardPos::new(2, 2)).unwrap();
        assert!(!graph.adjacency(from).iter().any(|(v, _)| *v == diagonal));
    }
}
