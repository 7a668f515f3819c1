//! Board ↔ window projection.
//!
//! The floor is rotated 45° about Z, tilted about X and scaled. Walls are
//! vertical planes standing on a room's far edges, so a window point can hit
//! the floor, the far-left wall or the far-right wall; picking returns the
//! surface nearest the viewer.

use glam::{Mat2, Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::Room;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Surface {
    Floor,
    LeftWall,
    RightWall,
}

/// Result of picking a window point against a room.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub surface: Surface,
    /// Board-space point on the surface (`z` is height above the floor).
    pub board: Vec3,
    /// Window-space depth; larger is nearer the viewer.
    pub depth: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewer {
    /// Board point drawn at the window centre.
    pub focus: Vec2,
    pub zoom: f32,
    /// X-axis tilt in degrees.
    pub tilt: f32,
    pub window: Vec2,
    /// Wall height in board units.
    pub wall_height: f32,
}

impl Default for Viewer {
    fn default() -> Self {
        Self {
            focus: Vec2::ZERO,
            zoom: 32.0,
            tilt: 62.0,
            window: Vec2::new(1024.0, 768.0),
            wall_height: 4.0,
        }
    }
}

impl Viewer {
    pub fn floor_matrix(&self) -> Mat4 {
        Mat4::from_translation((self.window * 0.5).extend(0.0))
            * Mat4::from_scale(Vec3::splat(self.zoom))
            * Mat4::from_rotation_x(-self.tilt.to_radians())
            * Mat4::from_rotation_z(45f32.to_radians())
            * Mat4::from_translation(-self.focus.extend(0.0))
    }

    pub fn board_to_window(&self, board: Vec2) -> Vec2 {
        self.floor_matrix()
            .transform_point3(board.extend(0.0))
            .truncate()
    }

    pub fn board3_to_window(&self, board: Vec3) -> Vec3 {
        self.floor_matrix().transform_point3(board)
    }

    /// Inverse of [`board_to_window`](Self::board_to_window) on the floor plane.
    pub fn window_to_board(&self, window: Vec2) -> Vec2 {
        let m = self.floor_matrix();
        let basis = Mat2::from_cols(m.x_axis.truncate().truncate(), m.y_axis.truncate().truncate());
        basis.inverse() * (window - m.w_axis.truncate().truncate())
    }

    fn hit(&self, surface: Surface, board: Vec3) -> SurfaceHit {
        SurfaceHit {
            surface,
            board,
            depth: self.board3_to_window(board).z,
        }
    }

    /// Picks the nearest of floor, far-left wall and far-right wall of `room`.
    pub fn window_to_surface(&self, window: Vec2, room: &Room) -> Option<SurfaceHit> {
        let m = self.floor_matrix();
        let col = |v: glam::Vec4| v.truncate().truncate();
        let (x_axis, y_axis, z_axis, origin) = (col(m.x_axis), col(m.y_axis), col(m.z_axis), col(m.w_axis));
        let (x0, y0) = (room.x as f32, room.y as f32);
        let (x1, y1) = ((room.x + room.dx) as f32, (room.y + room.dy) as f32);
        let mut hits = Vec::with_capacity(3);

        let floor = self.window_to_board(window);
        if floor.x >= x0 && floor.x <= x1 && floor.y >= y0 && floor.y <= y1 {
            hits.push(self.hit(Surface::Floor, floor.extend(0.0)));
        }

        // Far-left wall: the plane y = y1, parametrised by (x, z).
        let left = Mat2::from_cols(x_axis, z_axis).inverse() * (window - origin - y_axis * y1);
        if left.x >= x0 && left.x <= x1 && left.y >= 0.0 && left.y <= self.wall_height {
            hits.push(self.hit(Surface::LeftWall, Vec3::new(left.x, y1, left.y)));
        }

        // Far-right wall: the plane x = x1, parametrised by (y, z).
        let right = Mat2::from_cols(y_axis, z_axis).inverse() * (window - origin - x_axis * x1);
        if right.x >= y0 && right.x <= y1 && right.y >= 0.0 && right.y <= self.wall_height {
            hits.push(self.hit(Surface::RightWall, Vec3::new(x1, right.x, right.y)));
        }

        hits.into_iter().max_by(|a, b| a.depth.total_cmp(&b.depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn board_window_round_trip() {
        let viewer = Viewer {
            focus: Vec2::new(12.0, 7.5),
            zoom: 20.0,
            ..Viewer::default()
        };
        for (x, y) in [(0.0, 0.0), (3.5, 9.25), (40.0, 2.0), (-4.0, 17.0)] {
            let board = Vec2::new(x, y);
            let back = viewer.window_to_board(viewer.board_to_window(board));
            assert!(close(board, back), "{board} -> {back}");
        }
    }

    #[test]
    fn focus_lands_at_window_centre() {
        let viewer = Viewer {
            focus: Vec2::new(5.0, 5.0),
            ..Viewer::default()
        };
        assert!(close(viewer.board_to_window(viewer.focus), viewer.window * 0.5));
    }

    #[test]
    fn raised_wall_point_beats_floor() {
        let viewer = Viewer::default();
        let room = Room::new("hall", 0, 0, 8, 8);
        let on_wall = Vec3::new(4.0, 8.0, 2.0);
        let window = viewer.board3_to_window(on_wall).truncate();
        let hit = viewer.window_to_surface(window, &room).unwrap();
        assert_eq!(hit.surface, Surface::LeftWall);
        assert!((hit.board - on_wall).length() < 1e-3);

        let on_floor = viewer.board_to_window(Vec2::new(2.0, 2.0));
        let hit = viewer.window_to_surface(on_floor, &room).unwrap();
        assert_eq!(hit.surface, Surface::Floor);
    }
}
