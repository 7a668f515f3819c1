use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    HitOutcome, HitSpec, actor, ammo_left, check_target, face, mismatch, pay, play_sound,
    prep_ap, require_ap, resolve_hit,
};
use crate::action::{
    ActionBehavior, ActionError, ActionExec, AttackExec, BasicAttackDef, ExecPayload, ExecRun,
    InputOutcome, InvalidExec, MaintainStatus,
};
use crate::entity::{Entity, EntityId};
use crate::events::{GameEvent, SpriteCommand};
use crate::input::InputEvent;
use crate::state::Game;

/// Single-target attack. The only readyable action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackAction {
    def: BasicAttackDef,
    current_ammo: i32,
    #[serde(skip)]
    targets: Vec<EntityId>,
}

impl AttackAction {
    pub fn new(def: BasicAttackDef) -> Self {
        Self {
            current_ammo: def.ammo,
            def,
            targets: Vec::new(),
        }
    }

    pub fn def(&self) -> &BasicAttackDef {
        &self.def
    }

    pub fn ammo(&self) -> Option<i32> {
        ammo_left(self.def.ammo, self.current_ammo)
    }

    pub(crate) fn consume_ammo(&mut self) {
        if self.def.ammo > 0 {
            self.current_ammo = (self.current_ammo - 1).max(0);
        }
    }

    /// Targets valid at prep time, ascending by id.
    pub fn targets(&self) -> &[EntityId] {
        &self.targets
    }

    pub fn can_hit(&self, ent: &Entity, target: &Entity) -> bool {
        check_target(ent, target, self.def.range).is_ok()
    }

    fn spec(&self) -> HitSpec<'_> {
        HitSpec {
            damage: self.def.damage,
            strength: self.def.strength,
            kind: self.def.kind,
            conditions: &self.def.conditions,
        }
    }

    /// Fires an already paid-for readied attack at `target`.
    pub(crate) fn fire_readied(
        &self,
        game: &mut Game,
        owner: EntityId,
        index: usize,
        target: EntityId,
    ) -> Option<HitOutcome> {
        let pos = game.entity(target)?.pos;
        if self.def.ammo > 0
            && let Some(action) = game
                .entity_mut(owner)
                .and_then(|e| e.actions.get_mut(index))
        {
            action.consume_ammo();
        }
        face(game, owner, pos);
        game.push_event(GameEvent::Sprite {
            ent: owner,
            command: SpriteCommand::Attack,
        });
        play_sound(game, &self.def.sounds, "attack", owner);
        resolve_hit(game, owner, target, self.spec())
    }
}

impl ActionBehavior for AttackAction {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn ap(&self) -> i32 {
        self.def.ap
    }

    fn readyable(&self) -> bool {
        true
    }

    fn preppable(&self, ent: &Entity, _game: &Game) -> Result<(), ActionError> {
        prep_ap(ent, self.def.ap)?;
        if self.ammo() == Some(0) {
            return Err(ActionError::OutOfAmmo);
        }
        Ok(())
    }

    fn prep(&mut self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        self.preppable(ent, game)?;
        self.targets = game
            .living()
            .filter(|t| self.can_hit(ent, t))
            .map(|t| t.id)
            .collect();
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
        match game.entity_at(*pos) {
            Some(target) if self.targets.contains(&target.id) => InputOutcome::commit(
                ActionExec::new(ent.id, index, AttackExec { target: target.id }),
            ),
            _ => InputOutcome::ignored(),
        }
    }

    fn validate(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec> {
        let ExecPayload::BasicAttack(attack) = &exec.payload else {
            return Err(mismatch("BasicAttack", exec));
        };
        let ent = actor(game, exec)?;
        require_ap(ent, self.def.ap)?;
        if self.ammo() == Some(0) {
            return Err(InvalidExec::OutOfAmmo);
        }
        let target = game
            .entity(attack.target)
            .ok_or(InvalidExec::EntityGone(attack.target))?;
        check_target(ent, target, self.def.range)
    }

    fn maintain(&self, _dt: f64, game: &mut Game, run: &mut ExecRun) -> MaintainStatus {
        let ExecPayload::BasicAttack(attack) = &run.exec.payload else {
            return MaintainStatus::Complete;
        };
        let (id, target) = (run.exec.ent, attack.target);
        pay(game, &run.exec, self.def.ap, true);
        if let Some(pos) = game.entity(target).map(|t| t.pos) {
            face(game, id, pos);
        }
        game.push_event(GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Attack,
        });
        play_sound(game, &self.def.sounds, "attack", id);
        resolve_hit(game, id, target, self.spec());
        MaintainStatus::Complete
    }

    fn cancel(&mut self) {
        self.targets.clear();
    }

    fn sound_map(&self) -> &BTreeMap<String, String> {
        &self.def.sounds
    }

    fn push(&self) -> serde_json::Value {
        serde_json::json!({
            "Name": self.def.name,
            "Ap": self.def.ap,
            "Damage": self.def.damage,
            "Strength": self.def.strength,
            "Range": self.def.range,
            "Ammo": self.ammo().unwrap_or(-1),
        })
    }
}
