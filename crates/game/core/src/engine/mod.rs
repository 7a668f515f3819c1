//! Action dispatch and turn bookkeeping.
//!
//! [`GameEngine`] borrows a [`Game`] and is the only path through which
//! actions mutate it: prepping an action for the selected entity, feeding it
//! input, beginning a committed exec and maintaining it frame by frame.
//! Readied actions of the other side fire from here when a running exec
//! reports [`MaintainStatus::CheckForInterrupts`].

mod turns;

pub use turns::{ActionState, TurnState, side_for_turn};

use tracing::{debug, info, warn};

use crate::action::{
    Action, ActionBehavior, ActionError, ActionExec, ExecRun, InputOutcome, InvalidExec,
    MaintainStatus,
};
use crate::entity::EntityId;
use crate::events::GameEvent;
use crate::input::InputEvent;
use crate::state::Game;

pub struct GameEngine<'a> {
    game: &'a mut Game,
}

impl<'a> GameEngine<'a> {
    pub fn new(game: &'a mut Game) -> Self {
        Self { game }
    }

    pub fn game(&self) -> &Game {
        self.game
    }

    /// Prepares action `index` of `ent` and makes it the current action.
    pub fn prep_action(&mut self, ent: EntityId, index: usize) -> Result<(), ActionError> {
        if self.game.action_state == ActionState::DoingAction {
            return Err(ActionError::Busy);
        }
        self.cancel_action();

        let entity = self
            .game
            .entity(ent)
            .ok_or(ActionError::EntityNotFound(ent))?;
        if !entity.is_alive() {
            return Err(ActionError::EntityDead(ent));
        }
        if entity.side() != self.game.side {
            return Err(ActionError::NotYourTurn(entity.side()));
        }
        let mut action = entity
            .actions
            .get(index)
            .cloned()
            .ok_or(ActionError::UnknownAction { ent, index })?;
        action.prep(entity, self.game)?;

        if let Some(e) = self.game.entity_mut(ent) {
            e.actions[index] = action;
            e.current_action = Some(index);
        }
        self.game.select(Some(ent));
        self.game.action_state = ActionState::PreppingAction;
        debug!(target: "core::exec", entity = %ent, index, "action prepped");
        Ok(())
    }

    /// Routes input to the selected entity's prepped action.
    pub fn handle_input(&mut self, input: &InputEvent) -> InputOutcome {
        if *input == InputEvent::Cancel {
            return if self.cancel_action() {
                InputOutcome::consumed()
            } else {
                InputOutcome::ignored()
            };
        }
        if self.game.player_inactive || self.game.action_state != ActionState::PreppingAction {
            return InputOutcome::ignored();
        }
        let Some(ent) = self.game.selected.and_then(|id| self.game.entity(id)) else {
            return InputOutcome::ignored();
        };
        let Some(index) = ent.current_action else {
            return InputOutcome::ignored();
        };
        let Some(mut action) = ent.actions.get(index).cloned() else {
            return InputOutcome::ignored();
        };
        let id = ent.id;
        let outcome = action.handle_input(ent, index, input, self.game);
        if let Some(e) = self.game.entity_mut(id) {
            e.actions[index] = action;
        }
        if outcome.exec.is_some() {
            self.game.action_state = ActionState::WaitingAction;
        }
        outcome
    }

    /// Drops the prepped action. Only possible before its exec begins.
    pub fn cancel_action(&mut self) -> bool {
        if !matches!(
            self.game.action_state,
            ActionState::PreppingAction | ActionState::WaitingAction
        ) {
            return false;
        }
        if let Some(id) = self.game.selected
            && let Some(e) = self.game.entity_mut(id)
            && let Some(index) = e.current_action.take()
            && let Some(action) = e.actions.get_mut(index)
        {
            action.cancel();
        }
        self.game.action_state = ActionState::NoAction;
        true
    }

    /// Checks an exec against the current state without applying it.
    pub fn validate(&self, exec: &ActionExec) -> Result<(), InvalidExec> {
        let ent = self
            .game
            .entity(exec.ent)
            .ok_or(InvalidExec::EntityGone(exec.ent))?;
        if !ent.is_alive() {
            return Err(InvalidExec::EntityDead(exec.ent));
        }
        if ent.side() != self.game.side {
            return Err(InvalidExec::WrongSide {
                ent: ent.id,
                side: ent.side(),
            });
        }
        let action = ent
            .actions
            .get(exec.index)
            .ok_or(InvalidExec::UnknownAction {
                ent: exec.ent,
                index: exec.index,
            })?;
        action.validate(exec, self.game)
    }

    /// Validates and commits an exec. From here on it cannot be rejected.
    pub fn begin(&mut self, exec: ActionExec) -> Result<(), InvalidExec> {
        if self.game.current_exec().is_some() {
            return Err(InvalidExec::Busy);
        }
        self.game.action_state = ActionState::VerifyingAction;
        if let Err(err) = self.validate(&exec) {
            warn!(target: "core::exec", entity = %exec.ent, kind = exec.kind(), %err, "exec dropped");
            if let Some(e) = self.game.entity_mut(exec.ent) {
                e.current_action = None;
            }
            self.game.action_state = ActionState::NoAction;
            return Err(err);
        }

        info!(target: "core::exec", entity = %exec.ent, action = ?exec, "exec begins");
        if let Some(e) = self.game.entity_mut(exec.ent) {
            e.current_action = Some(exec.index);
        }
        self.game.action_state = ActionState::DoingAction;
        self.game.record_exec(exec.clone());
        self.game.push_event(GameEvent::ExecCommitted(exec.clone()));
        self.game.put_run(ExecRun::new(exec));
        Ok(())
    }

    /// Advances the running exec by one frame. `None` when nothing runs.
    pub fn maintain(&mut self, dt: f64) -> Option<MaintainStatus> {
        let mut run = self.game.take_run()?;
        let action = self
            .game
            .entity(run.exec.ent)
            .and_then(|e| e.actions.get(run.exec.index))
            .cloned();
        let Some(action) = action else {
            self.finish(&run);
            return Some(MaintainStatus::Complete);
        };

        match action.maintain(dt, self.game, &mut run) {
            MaintainStatus::Complete => {
                self.finish(&run);
                Some(MaintainStatus::Complete)
            }
            status => {
                if status == MaintainStatus::CheckForInterrupts && self.fire_interrupts(run.exec.ent)
                {
                    action.interrupt(&mut run);
                }
                if run.calls >= self.game.config.max_maintain_steps {
                    warn!(target: "core::exec", entity = %run.exec.ent, calls = run.calls, "exec abandoned");
                    self.finish(&run);
                    return Some(MaintainStatus::Complete);
                }
                self.game.put_run(run);
                Some(MaintainStatus::InProgress)
            }
        }
    }

    /// Begins `exec` and maintains it with the replay step until done.
    pub fn run_to_completion(&mut self, exec: ActionExec) -> Result<(), InvalidExec> {
        self.begin(exec)?;
        let step = self.game.config.replay_step;
        while let Some(MaintainStatus::InProgress) = self.maintain(step) {}
        Ok(())
    }

    fn finish(&mut self, run: &ExecRun) {
        if let Some(e) = self.game.entity_mut(run.exec.ent) {
            e.current_action = None;
        }
        self.game.action_state = ActionState::NoAction;
        debug!(target: "core::exec", entity = %run.exec.ent, calls = run.calls, "exec complete");
    }

    /// Fires every readied attack of the opposing side that can reach
    /// `mover`, in ascending entity id order. Returns whether any fired.
    fn fire_interrupts(&mut self, mover: EntityId) -> bool {
        let Some(target) = self.game.entity(mover) else {
            return false;
        };
        let side = target.side();
        let shooters: Vec<_> = self
            .game
            .living()
            .filter(|e| e.side() != side && e.side().is_playing())
            .filter_map(|e| {
                let index = e.ready?;
                match e.actions.get(index)? {
                    Action::BasicAttack(attack) if attack.can_hit(e, target) => {
                        Some((e.id, index, attack.clone()))
                    }
                    _ => None,
                }
            })
            .collect();

        let mut fired = false;
        for (owner, index, attack) in shooters {
            if !self.game.entity(mover).is_some_and(|e| e.is_alive()) {
                break;
            }
            if let Some(e) = self.game.entity_mut(owner) {
                e.ready = None;
            }
            info!(target: "core::exec", %owner, %mover, "readied action fires");
            attack.fire_readied(self.game, owner, index, mover);
            fired = true;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{AttackExec, MoveExec, ReadyExec, SummonExec};
    use crate::entity::Side;
    use crate::geom::BoardPos;
    use crate::state::tests::{spawn, test_game};

    fn denizens_first() -> Game {
        let mut game = test_game();
        game.first_side = Side::Denizens;
        game.side = Side::Denizens;
        game
    }

    #[test]
    fn summon_spends_ap_and_ammo() {
        let mut game = denizens_first();
        let haunt = spawn(&mut game, "Poltergeist", 5, 6);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();

        for pos in [BoardPos::new(4, 6), BoardPos::new(6, 6)] {
            engine.prep_action(haunt, 1).unwrap();
            engine
                .run_to_completion(ActionExec::new(haunt, 1, SummonExec { pos }))
                .unwrap();
        }

        assert!(engine.prep_action(haunt, 1).is_err());
        let ent = game.entity(haunt).unwrap();
        assert_eq!(ent.stats.ap_cur(), 10 - 8);
        assert_eq!(ent.actions[1].ammo(), Some(0));
        assert_eq!(game.living().filter(|e| e.name() == "Shade").count(), 2);
    }

    #[test]
    fn move_pays_per_step() {
        let mut game = test_game();
        let id = spawn(&mut game, "Occultist", 0, 1);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();
        engine.prep_action(id, 0).unwrap();
        let outcome = engine.handle_input(&InputEvent::Click(BoardPos::new(3, 1)));
        let exec = outcome.exec.unwrap();
        assert_eq!(engine.game().action_state, ActionState::WaitingAction);

        engine.run_to_completion(exec).unwrap();
        let ent = game.entity(id).unwrap();
        assert_eq!(ent.pos, BoardPos::new(3, 1));
        assert_eq!(ent.stats.ap_cur(), 7);
        assert_eq!(game.exec_log().len(), 1);
        assert_eq!(game.action_state, ActionState::NoAction);
    }

    #[test]
    fn attack_costing_all_ap_leaves_zero() {
        let mut game = test_game();
        let shooter = spawn(&mut game, "Occultist", 5, 2);
        let target = spawn(&mut game, "Poltergeist", 5, 5);
        game.toggle_door(0, 0);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();
        engine.game.set_ap(shooter, 3);

        engine.prep_action(shooter, 1).unwrap();
        engine
            .run_to_completion(ActionExec::new(shooter, 1, AttackExec { target }))
            .unwrap();
        assert_eq!(game.entity(shooter).unwrap().stats.ap_cur(), 0);
        assert_eq!(
            GameEngine::new(&mut game).prep_action(shooter, 1),
            Err(ActionError::NotEnoughAp { need: 3, have: 0 })
        );
        let defender = game.entity(target).unwrap();
        assert_eq!(defender.info.last_ent_that_attacked_me, Some(shooter));
    }

    #[test]
    fn closed_door_blocks_attack() {
        let mut game = test_game();
        let shooter = spawn(&mut game, "Occultist", 5, 2);
        let target = spawn(&mut game, "Poltergeist", 5, 5);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();
        let err = engine
            .begin(ActionExec::new(shooter, 1, AttackExec { target }))
            .unwrap_err();
        assert_eq!(err, InvalidExec::NoLos(BoardPos::new(5, 5)));
        assert_eq!(engine.game().action_state, ActionState::NoAction);
        assert!(game.exec_log().is_empty());
    }

    #[test]
    fn exec_for_the_wrong_side_is_dropped() {
        let mut game = test_game();
        let haunt = spawn(&mut game, "Poltergeist", 5, 6);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();
        let exec = ActionExec::new(
            haunt,
            0,
            MoveExec {
                path: vec![BoardPos::new(5, 5)],
            },
        );
        assert_eq!(
            engine.run_to_completion(exec),
            Err(InvalidExec::WrongSide {
                ent: haunt,
                side: Side::Denizens
            })
        );
    }

    #[test]
    fn readied_attack_interrupts_a_move() {
        let mut game = test_game();
        let guard = spawn(&mut game, "Occultist", 5, 1);
        let haunt = spawn(&mut game, "Poltergeist", 5, 7);
        game.toggle_door(0, 0);

        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();
        engine
            .run_to_completion(ActionExec::new(guard, 1, ReadyExec))
            .unwrap();
        assert_eq!(engine.game().entity(guard).unwrap().ready, Some(1));
        assert_eq!(engine.game().entity(guard).unwrap().stats.ap_cur(), 7);

        engine.end_side_turn();
        engine.begin_side_turn();
        let walk = MoveExec {
            path: vec![BoardPos::new(5, 6), BoardPos::new(5, 5)],
        };
        engine
            .run_to_completion(ActionExec::new(haunt, 0, walk))
            .unwrap();

        let mover = game.entity(haunt).unwrap();
        assert_eq!(mover.pos, BoardPos::new(5, 6));
        assert_eq!(mover.info.last_ent_that_attacked_me, Some(guard));
        assert_eq!(game.entity(guard).unwrap().ready, None);
    }

    #[test]
    fn cancel_only_before_begin() {
        let mut game = test_game();
        let id = spawn(&mut game, "Occultist", 0, 1);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();
        engine.prep_action(id, 0).unwrap();
        assert!(engine.handle_input(&InputEvent::Cancel).consumed);
        assert_eq!(engine.game().action_state, ActionState::NoAction);

        let exec = ActionExec::new(
            id,
            0,
            MoveExec {
                path: vec![BoardPos::new(1, 1)],
            },
        );
        engine.begin(exec).unwrap();
        assert!(!engine.cancel_action());
        assert_eq!(engine.game().action_state, ActionState::DoingAction);
    }
}
