use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{actor, ammo_left, face, mismatch, pay, play_sound, prep_ap, require_ap};
use crate::action::{
    ActionBehavior, ActionError, ActionExec, ExecPayload, ExecRun, InputOutcome, InvalidExec,
    MaintainStatus, SummonDef, SummonExec,
};
use crate::entity::Entity;
use crate::events::{GameEvent, SpriteCommand};
use crate::geom::{BoardPos, BoardRect};
use crate::input::InputEvent;
use crate::state::Game;

/// Spawns a new entity on a free cell near the summoner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummonAction {
    def: SummonDef,
    current_ammo: i32,
    #[serde(skip)]
    cells: Vec<BoardPos>,
}

impl SummonAction {
    pub fn new(def: SummonDef) -> Self {
        Self {
            current_ammo: def.ammo,
            def,
            cells: Vec::new(),
        }
    }

    pub fn ammo(&self) -> Option<i32> {
        ammo_left(self.def.ammo, self.current_ammo)
    }

    pub(crate) fn consume_ammo(&mut self) {
        if self.def.ammo > 0 {
            self.current_ammo = (self.current_ammo - 1).max(0);
        }
    }

    fn cell_ok(&self, ent: &Entity, game: &Game, pos: BoardPos) -> bool {
        let Some(def) = game.registries().entity(&self.def.ent) else {
            return false;
        };
        pos != ent.pos
            && ent.pos.chebyshev(pos) <= self.def.range
            && (!self.def.personal_los || ent.has_los(&BoardRect::cell(pos)))
            && game.can_place(def, pos, None)
    }

    /// Free cells in range, row-major.
    pub fn cells(&self, ent: &Entity, game: &Game) -> Vec<BoardPos> {
        let r = self.def.range.max(0);
        BoardRect::new(ent.pos.x - r, ent.pos.y - r, 2 * r + 1, 2 * r + 1)
            .cells()
            .filter(|&pos| self.cell_ok(ent, game, pos))
            .collect()
    }
}

impl ActionBehavior for SummonAction {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn ap(&self) -> i32 {
        self.def.ap
    }

    fn preppable(&self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        prep_ap(ent, self.def.ap)?;
        if self.ammo() == Some(0) {
            return Err(ActionError::OutOfAmmo);
        }
        if self.cells(ent, game).is_empty() {
            return Err(ActionError::NoTargets);
        }
        Ok(())
    }

    fn prep(&mut self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        self.preppable(ent, game)?;
        self.cells = self.cells(ent, game);
        Ok(())
    }

    fn handle_input(
        &mut self,
        ent: &Entity,
        index: usize,
        input: &InputEvent,
        _game: &Game,
    ) -> InputOutcome {
        match input {
            InputEvent::Click(pos) if self.cells.contains(pos) => {
                InputOutcome::commit(ActionExec::new(ent.id, index, SummonExec { pos: *pos }))
            }
            _ => InputOutcome::ignored(),
        }
    }

    fn validate(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec> {
        let ExecPayload::Summon(summon) = &exec.payload else {
            return Err(mismatch("Summon", exec));
        };
        let ent = actor(game, exec)?;
        require_ap(ent, self.def.ap)?;
        if self.ammo() == Some(0) {
            return Err(InvalidExec::OutOfAmmo);
        }
        if !self.cell_ok(ent, game, summon.pos) {
            return Err(InvalidExec::Blocked(summon.pos));
        }
        Ok(())
    }

    fn maintain(&self, _dt: f64, game: &mut Game, run: &mut ExecRun) -> MaintainStatus {
        let ExecPayload::Summon(summon) = &run.exec.payload else {
            return MaintainStatus::Complete;
        };
        let (id, pos) = (run.exec.ent, summon.pos);
        pay(game, &run.exec, self.def.ap, true);
        face(game, id, pos);
        let command = if self.def.animation.is_empty() {
            SpriteCommand::Summon
        } else {
            SpriteCommand::Play(self.def.animation.clone())
        };
        game.push_event(GameEvent::Sprite { ent: id, command });
        play_sound(game, &self.def.sounds, "summon", id);

        match game.spawn_at(&self.def.ent, pos) {
            Some(spawned) => {
                if let Some(e) = game.entity_mut(spawned) {
                    e.stats.on_begin();
                }
                debug!(target: "core::exec", summoner = %id, %spawned, cell = %pos, "summoned");
            }
            None => warn!(target: "core::exec", summoner = %id, cell = %pos, "summon failed"),
        }
        MaintainStatus::Complete
    }

    fn cancel(&mut self) {
        self.cells.clear();
    }

    fn sound_map(&self) -> &BTreeMap<String, String> {
        &self.def.sounds
    }

    fn push(&self) -> serde_json::Value {
        serde_json::json!({
            "Name": self.def.name,
            "Ap": self.def.ap,
            "Ent": self.def.ent,
            "Range": self.def.range,
            "Ammo": self.ammo().unwrap_or(-1),
        })
    }
}
