use serde::{Deserialize, Serialize};

use super::Game;
use crate::entity::Side;
use crate::events::GameEvent;
use crate::geom::BoardPos;

/// Annotated circle a script pins on the map for one side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub side: Side,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Waypoint {
    pub fn contains(&self, pos: BoardPos) -> bool {
        let (dx, dy) = (pos.x as f64 + 0.5 - self.x, pos.y as f64 + 0.5 - self.y);
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

impl Game {
    /// Adds a waypoint, replacing any with the same name.
    pub fn set_waypoint(&mut self, waypoint: Waypoint) {
        self.waypoints.retain(|w| w.name != waypoint.name);
        self.waypoints.push(waypoint);
        self.push_event(GameEvent::WaypointsChanged);
    }

    pub fn remove_waypoint(&mut self, name: &str) -> bool {
        let before = self.waypoints.len();
        self.waypoints.retain(|w| w.name != name);
        let removed = self.waypoints.len() != before;
        if removed {
            self.push_event(GameEvent::WaypointsChanged);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_game;
    use super::*;

    #[test]
    fn same_name_replaces() {
        let mut game = test_game();
        let mut wp = Waypoint {
            name: "exit".into(),
            side: Side::Intruders,
            x: 1.0,
            y: 1.0,
            radius: 1.0,
        };
        game.set_waypoint(wp.clone());
        wp.x = 5.5;
        game.set_waypoint(wp);
        assert_eq!(game.waypoints.len(), 1);
        assert!(game.waypoints[0].contains(BoardPos::new(5, 1)));
        assert!(game.remove_waypoint("exit"));
        assert!(!game.remove_waypoint("exit"));
    }
}
