use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{actor, face, mismatch, play_sound, prep_ap, require_ap};
use crate::action::{
    ActionBehavior, ActionError, ActionExec, ExecPayload, ExecRun, InputOutcome, InvalidExec,
    MaintainStatus, MoveDef, MoveExec,
};
use crate::config::GameConfig;
use crate::entity::Entity;
use crate::events::{GameEvent, SpriteCommand};
use crate::geom::BoardPos;
use crate::input::InputEvent;
use crate::state::Game;

/// Walks a path one cell at a time, paying [`GameConfig::STEP_COST`] per cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveAction {
    def: MoveDef,
    #[serde(skip)]
    reach: BTreeMap<BoardPos, i32>,
}

impl MoveAction {
    pub fn new(def: MoveDef) -> Self {
        Self {
            def,
            reach: BTreeMap::new(),
        }
    }

    /// Cells reachable with the AP the entity had when prepped.
    pub fn reach(&self) -> &BTreeMap<BoardPos, i32> {
        &self.reach
    }

    fn finish(game: &mut Game, run: &ExecRun) -> MaintainStatus {
        if let Some(ent) = game.entity_mut(run.exec.ent) {
            let pos = ent.pos;
            ent.set_pos(pos);
        }
        MaintainStatus::Complete
    }
}

impl ActionBehavior for MoveAction {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn ap(&self) -> i32 {
        GameConfig::STEP_COST
    }

    fn preppable(&self, ent: &Entity, _game: &Game) -> Result<(), ActionError> {
        prep_ap(ent, GameConfig::STEP_COST)
    }

    fn prep(&mut self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        self.preppable(ent, game)?;
        self.reach = game.reachable(ent.id, ent.stats.ap_cur());
        Ok(())
    }

    fn handle_input(
        &mut self,
        ent: &Entity,
        index: usize,
        input: &InputEvent,
        game: &Game,
    ) -> InputOutcome {
        let InputEvent::Click(pos) = input else {
            return InputOutcome::ignored();
        };
        if !self.reach.contains_key(pos) {
            return InputOutcome::ignored();
        }
        match game.find_path(ent.id, *pos) {
            Some((path, cost)) if cost <= ent.stats.ap_cur() => {
                InputOutcome::commit(ActionExec::new(ent.id, index, MoveExec { path }))
            }
            _ => InputOutcome::consumed(),
        }
    }

    fn validate(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec> {
        let ExecPayload::Move(m) = &exec.payload else {
            return Err(mismatch("Move", exec));
        };
        let ent = actor(game, exec)?;
        let first = *m.path.first().ok_or(InvalidExec::EmptyPath)?;
        if !ent.pos.is_adjacent(first) {
            return Err(InvalidExec::Blocked(first));
        }
        // Only the first step must be affordable; the walk stops when AP runs out.
        require_ap(ent, GameConfig::STEP_COST)
    }

    fn maintain(&self, dt: f64, game: &mut Game, run: &mut ExecRun) -> MaintainStatus {
        let ExecPayload::Move(m) = &run.exec.payload else {
            return MaintainStatus::Complete;
        };
        let id = run.exec.ent;
        if run.interrupted || run.step >= m.path.len() {
            return Self::finish(game, run);
        }
        let next = m.path[run.step];
        if !run.started {
            run.started = true;
            face(game, id, next);
        }

        let Some(ent) = game.entity(id) else {
            return MaintainStatus::Complete;
        };
        if !ent.is_alive() {
            return MaintainStatus::Complete;
        }
        let from = ent.pos;
        run.progress += dt * ent.walking_speed(&game.config);
        if run.progress < 1.0 {
            let t = run.progress;
            if let Some(ent) = game.entity_mut(id) {
                ent.fpos = (
                    from.x as f64 + (next.x - from.x) as f64 * t,
                    from.y as f64 + (next.y - from.y) as f64 * t,
                );
            }
            return MaintainStatus::InProgress;
        }
        run.progress -= 1.0;

        let blocked = ent.stats.ap_cur() < GameConfig::STEP_COST
            || !game.floor().move_step(from, next)
            || !game.can_place(&ent.def, next, Some(id));
        if blocked {
            debug!(target: "core::exec", entity = %id, cell = %next, "move stopped");
            return Self::finish(game, run);
        }

        face(game, id, next);
        if let Some(ent) = game.entity_mut(id) {
            ent.set_pos(next);
            ent.stats.spend_ap(GameConfig::STEP_COST);
        }
        game.update_entity_los(id);
        game.push_event(GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Move(next),
        });
        play_sound(game, &self.def.sounds, "step", id);
        run.step += 1;
        MaintainStatus::CheckForInterrupts
    }

    fn cancel(&mut self) {
        self.reach.clear();
    }

    fn sound_map(&self) -> &BTreeMap<String, String> {
        &self.def.sounds
    }

    fn push(&self) -> serde_json::Value {
        serde_json::json!({
            "Name": self.def.name,
            "Ap": GameConfig::STEP_COST,
        })
    }
}
