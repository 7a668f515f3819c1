//! Concrete action variants and the rules they share.

mod aoe;
mod attack;
mod interact;
mod movement;
mod summon;

use std::collections::BTreeMap;

pub use aoe::AoeAction;
pub use attack::AttackAction;
pub use interact::InteractAction;
pub use movement::MoveAction;
pub use summon::SummonAction;

use tracing::debug;

use super::{ActionError, ActionExec, InvalidExec};
use crate::entity::{Entity, EntityId, Side};
use crate::events::{GameEvent, SpriteCommand};
use crate::stats::DamageKind;
use crate::state::Game;

pub(crate) fn prep_ap(ent: &Entity, need: i32) -> Result<(), ActionError> {
    let have = ent.stats.ap_cur();
    if need > have {
        return Err(ActionError::NotEnoughAp { need, have });
    }
    Ok(())
}

pub(crate) fn require_ap(ent: &Entity, need: i32) -> Result<(), InvalidExec> {
    let have = ent.stats.ap_cur();
    if need > have {
        return Err(InvalidExec::InsufficientAp { need, have });
    }
    Ok(())
}

pub(crate) fn actor<'g>(game: &'g Game, exec: &ActionExec) -> Result<&'g Entity, InvalidExec> {
    let ent = game
        .entity(exec.ent)
        .ok_or(InvalidExec::EntityGone(exec.ent))?;
    if !ent.is_alive() {
        return Err(InvalidExec::EntityDead(exec.ent));
    }
    Ok(ent)
}

pub(crate) fn mismatch(action: &'static str, exec: &ActionExec) -> InvalidExec {
    InvalidExec::PayloadMismatch {
        action,
        payload: exec.kind(),
    }
}

/// Limited ammo: `Some(left)`; unlimited: `None`.
pub(crate) fn ammo_left(max: i32, current: i32) -> Option<i32> {
    (max > 0).then_some(current)
}

/// Debits AP and, optionally, one use from the acting entity's copy of the
/// action.
pub(crate) fn pay(game: &mut Game, exec: &ActionExec, ap: i32, ammo: bool) {
    if let Some(ent) = game.entity_mut(exec.ent) {
        ent.stats.spend_ap(ap);
        if ammo && let Some(action) = ent.actions.get_mut(exec.index) {
            action.consume_ammo();
        }
    }
}

pub(crate) fn play_sound(
    game: &mut Game,
    sounds: &BTreeMap<String, String>,
    key: &str,
    ent: EntityId,
) {
    if let Some(name) = sounds.get(key) {
        game.push_event(GameEvent::Sound {
            name: name.clone(),
            ent: Some(ent),
        });
    }
}

pub(crate) fn face(game: &mut Game, ent: EntityId, towards: crate::geom::BoardPos) {
    let Some(e) = game.entity_mut(ent) else {
        return;
    };
    let facing = e.pos.facing_towards(towards);
    if e.pos == towards || e.facing == facing {
        return;
    }
    e.facing = facing;
    game.push_event(GameEvent::Sprite {
        ent,
        command: SpriteCommand::Turn(facing),
    });
}

/// A living enemy within `range` that `ent` can see.
pub(crate) fn check_target(ent: &Entity, target: &Entity, range: i32) -> Result<(), InvalidExec> {
    if !target.is_alive() || target.side() == ent.side() || target.side() == Side::Object {
        return Err(InvalidExec::InvalidTarget(target.id));
    }
    if ent.pos.chebyshev(target.pos) > range {
        return Err(InvalidExec::OutOfRange(target.pos));
    }
    if !ent.has_los(&target.footprint()) {
        return Err(InvalidExec::NoLos(target.pos));
    }
    Ok(())
}

/// Attack parameters shared by single-target and area attacks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct HitSpec<'a> {
    pub damage: i32,
    pub strength: i32,
    pub kind: DamageKind,
    pub conditions: &'a [String],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HitOutcome {
    pub roll: i32,
    pub hit: bool,
    pub dealt: i32,
    pub killed: bool,
}

/// Rolls one attack. The d10 roll plus attack bonus and strength must reach
/// the defender's Corpus (Ego for mental damage) plus defense bonus.
pub(crate) fn resolve_hit(
    game: &mut Game,
    attacker: EntityId,
    target: EntityId,
    spec: HitSpec<'_>,
) -> Option<HitOutcome> {
    let attack = game.entity(attacker)?.stats.attack();
    let defender = game.entity(target)?;
    let guard = if spec.kind.is_mental() {
        defender.stats.ego()
    } else {
        defender.stats.corpus()
    } + defender.stats.defense();

    let roll = game.rand(10);
    let hit = roll + attack + spec.strength >= guard;

    if let Some(a) = game.entity_mut(attacker) {
        a.info.last_ent_that_i_attacked = Some(target);
    }
    if let Some(d) = game.entity_mut(target) {
        d.info.last_ent_that_attacked_me = Some(attacker);
    }

    let mut outcome = HitOutcome {
        roll,
        hit,
        dealt: 0,
        killed: false,
    };
    if hit {
        let damage = game.damage_entity(target, spec.damage, spec.kind);
        outcome.dealt = damage.dealt;
        outcome.killed = damage.killed;
        for name in spec.conditions {
            game.apply_condition(target, name);
        }
    } else {
        game.push_event(GameEvent::Sprite {
            ent: target,
            command: SpriteCommand::Defend,
        });
    }
    debug!(
        target: "core::exec",
        %attacker,
        %target,
        roll,
        hit,
        dealt = outcome.dealt,
        "attack resolved"
    );
    Some(outcome)
}
