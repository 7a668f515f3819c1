use serde::{Deserialize, Serialize};
use tracing::info;

use super::GameEngine;
use crate::entity::Side;

/// Round state machine position.
///
/// ```text
/// Init -> Start -> AiAction <-> ScriptOnAction
///                  AiAction -> MainPhaseOver -> End -> Start
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
pub enum TurnState {
    #[default]
    Init,
    Start,
    AiAction,
    ScriptOnAction,
    MainPhaseOver,
    End,
}

/// Lifecycle of the action currently in hand.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
pub enum ActionState {
    #[default]
    NoAction,
    PreppingAction,
    /// Exec produced, waiting for scripts to observe it.
    WaitingAction,
    VerifyingAction,
    DoingAction,
}

/// Odd turns belong to the side that moves first, even turns to the other.
pub fn side_for_turn(first: Side, turn: u32) -> Side {
    if turn % 2 == 1 {
        first
    } else {
        first.opponent().unwrap_or(first)
    }
}

impl GameEngine<'_> {
    /// Start of a side's turn: AP refills, readied actions lapse and the
    /// side's conditions tick once.
    pub fn begin_side_turn(&mut self) {
        let side = side_for_turn(self.game.first_side, self.game.turn);
        self.game.side = side;
        let ids: Vec<_> = self.game.side_entities(side).map(|e| e.id).collect();
        for id in ids {
            if let Some(ent) = self.game.entity_mut(id) {
                ent.stats.refresh_ap();
                ent.ready = None;
                ent.current_action = None;
            }
        }
        self.game.tick_conditions(side);
        self.game.clear_exec_log();
        self.game.action_state = super::ActionState::NoAction;
        info!(target: "core::turn", turn = self.game.turn, %side, "side turn begins");
    }

    /// Re-enters the current side's turn after a restore. Nothing refreshes;
    /// only the exec log starts over.
    pub fn resume_side_turn(&mut self) {
        self.cancel_action();
        self.game.clear_exec_log();
        self.game.action_state = super::ActionState::NoAction;
        info!(target: "core::turn", turn = self.game.turn, side = %self.game.side, "side turn resumed");
    }

    /// Hands the board to the other side.
    pub fn end_side_turn(&mut self) -> Side {
        self.cancel_action();
        self.game.turn += 1;
        self.game.side = side_for_turn(self.game.first_side, self.game.turn);
        info!(target: "core::turn", turn = self.game.turn, side = %self.game.side, "side turn ends");
        self.game.side
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{spawn, test_game};

    #[test]
    fn alternation() {
        assert_eq!(side_for_turn(Side::Denizens, 1), Side::Denizens);
        assert_eq!(side_for_turn(Side::Denizens, 2), Side::Intruders);
        assert_eq!(side_for_turn(Side::Intruders, 3), Side::Intruders);
    }

    #[test]
    fn turn_start_refreshes_only_the_moving_side() {
        let mut game = test_game();
        let a = spawn(&mut game, "Occultist", 2, 2);
        let d = spawn(&mut game, "Poltergeist", 2, 6);
        game.set_ap(a, 1);
        game.set_ap(d, 1);
        GameEngine::new(&mut game).begin_side_turn();
        assert_eq!(game.entity(a).unwrap().stats.ap_cur(), 10);
        assert_eq!(game.entity(d).unwrap().stats.ap_cur(), 1);

        let side = GameEngine::new(&mut game).end_side_turn();
        assert_eq!(side, Side::Denizens);
        assert_eq!(game.turn, 2);
        GameEngine::new(&mut game).begin_side_turn();
        let ap_cur: i32 = game.side_entities(side).map(|e| e.stats.ap_cur()).sum();
        let ap_max: i32 = game.side_entities(side).map(|e| e.stats.ap_max()).sum();
        assert!(ap_cur <= ap_max);
        assert_eq!(game.entity(d).unwrap().stats.ap_cur(), 10);
    }
}
