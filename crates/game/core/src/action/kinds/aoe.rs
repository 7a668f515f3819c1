use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    HitSpec, actor, ammo_left, face, mismatch, pay, play_sound, prep_ap, require_ap, resolve_hit,
};
use crate::action::{
    ActionBehavior, ActionError, ActionExec, AoeAttackDef, AoeExec, ExecPayload, ExecRun,
    InputOutcome, InvalidExec, MaintainStatus,
};
use crate::entity::{Entity, EntityId, Side};
use crate::events::{GameEvent, SpriteCommand};
use crate::geom::{BoardPos, BoardRect};
use crate::input::InputEvent;
use crate::state::Game;

/// Area attack on a square blast centred on a visible cell. Hits everyone
/// inside, including friends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AoeAction {
    def: AoeAttackDef,
    current_ammo: i32,
}

impl AoeAction {
    pub fn new(def: AoeAttackDef) -> Self {
        Self {
            current_ammo: def.ammo,
            def,
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

    pub fn blast(&self, center: BoardPos) -> BoardRect {
        let d = self.def.diameter.max(1);
        BoardRect::new(center.x - (d - 1) / 2, center.y - (d - 1) / 2, d, d)
    }

    /// Living non-object entities overlapping the blast, ascending by id.
    pub fn targets_at(&self, game: &Game, center: BoardPos) -> Vec<EntityId> {
        let blast = self.blast(center);
        game.living()
            .filter(|e| e.side() != Side::Object && e.footprint().overlaps(&blast))
            .map(|e| e.id)
            .collect()
    }

    fn check_cell(&self, ent: &Entity, pos: BoardPos) -> Result<(), InvalidExec> {
        if ent.pos.chebyshev(pos) > self.def.range {
            return Err(InvalidExec::OutOfRange(pos));
        }
        if !ent.has_los(&BoardRect::cell(pos)) {
            return Err(InvalidExec::NoLos(pos));
        }
        Ok(())
    }
}

impl ActionBehavior for AoeAction {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn ap(&self) -> i32 {
        self.def.ap
    }

    fn preppable(&self, ent: &Entity, _game: &Game) -> Result<(), ActionError> {
        prep_ap(ent, self.def.ap)?;
        if self.ammo() == Some(0) {
            return Err(ActionError::OutOfAmmo);
        }
        Ok(())
    }

    fn prep(&mut self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        self.preppable(ent, game)
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
        if self.check_cell(ent, *pos).is_err() {
            return InputOutcome::ignored();
        }
        let targets = self.targets_at(game, *pos);
        InputOutcome::commit(ActionExec::new(
            ent.id,
            index,
            AoeExec { pos: *pos, targets },
        ))
    }

    fn validate(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec> {
        let ExecPayload::AoeAttack(aoe) = &exec.payload else {
            return Err(mismatch("AoeAttack", exec));
        };
        let ent = actor(game, exec)?;
        require_ap(ent, self.def.ap)?;
        if self.ammo() == Some(0) {
            return Err(InvalidExec::OutOfAmmo);
        }
        self.check_cell(ent, aoe.pos)?;
        // Targets are a strictly ascending subset of whoever stands in the blast.
        let inside = self.targets_at(game, aoe.pos);
        let mut last = None;
        for &id in &aoe.targets {
            if game.entity(id).is_none() {
                return Err(InvalidExec::EntityGone(id));
            }
            if last.is_some_and(|prev| prev >= id) || !inside.contains(&id) {
                return Err(InvalidExec::InvalidTarget(id));
            }
            last = Some(id);
        }
        Ok(())
    }

    fn maintain(&self, _dt: f64, game: &mut Game, run: &mut ExecRun) -> MaintainStatus {
        let ExecPayload::AoeAttack(aoe) = &run.exec.payload else {
            return MaintainStatus::Complete;
        };
        let id = run.exec.ent;
        pay(game, &run.exec, self.def.ap, true);
        face(game, id, aoe.pos);
        game.push_event(GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Attack,
        });
        play_sound(game, &self.def.sounds, "attack", id);
        let spec = HitSpec {
            damage: self.def.damage,
            strength: self.def.strength,
            kind: self.def.kind,
            conditions: &self.def.conditions,
        };
        for &target in &aoe.targets {
            resolve_hit(game, id, target, spec);
        }
        MaintainStatus::Complete
    }

    fn cancel(&mut self) {}

    fn sound_map(&self) -> &BTreeMap<String, String> {
        &self.def.sounds
    }

    fn push(&self) -> serde_json::Value {
        serde_json::json!({
            "Name": self.def.name,
            "Ap": self.def.ap,
            "Damage": self.def.damage,
            "Range": self.def.range,
            "Diameter": self.def.diameter,
            "Ammo": self.ammo().unwrap_or(-1),
        })
    }
}
