use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{actor, mismatch, pay, play_sound, prep_ap, require_ap};
use crate::action::{
    ActionBehavior, ActionError, ActionExec, ExecPayload, ExecRun, InputOutcome, InteractDef,
    InteractExec, InteractTarget, InvalidExec, MaintainStatus,
};
use crate::entity::{Entity, EntityFlags, Side};
use crate::events::{GameEvent, SpriteCommand};
use crate::input::InputEvent;
use crate::state::Game;

/// Opens and closes doors, and uses object entities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractAction {
    def: InteractDef,
    #[serde(skip)]
    targets: Vec<InteractTarget>,
}

impl InteractAction {
    pub fn new(def: InteractDef) -> Self {
        Self {
            def,
            targets: Vec::new(),
        }
    }

    /// Doors with a crossing cell in range, then unused objects in range.
    pub fn candidates(&self, ent: &Entity, game: &Game) -> Vec<InteractTarget> {
        let floor = game.floor();
        let mut out = Vec::new();
        for (r, room) in floor.rooms.iter().enumerate() {
            for (d, door) in room.doors.iter().enumerate() {
                let near = door.crossings(room).iter().any(|(inside, outside)| {
                    ent.pos.chebyshev(*inside) <= self.def.range
                        || ent.pos.chebyshev(*outside) <= self.def.range
                });
                if near {
                    out.push(InteractTarget::Door { room: r, door: d });
                }
            }
        }
        out.extend(
            game.living()
                .filter(|o| {
                    o.side() == Side::Object
                        && !o.flags.contains(EntityFlags::USED)
                        && ent.pos.chebyshev(o.pos) <= self.def.range
                })
                .map(|o| InteractTarget::Entity(o.id)),
        );
        out
    }
}

impl ActionBehavior for InteractAction {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn ap(&self) -> i32 {
        self.def.ap
    }

    fn preppable(&self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        prep_ap(ent, self.def.ap)?;
        if self.candidates(ent, game).is_empty() {
            return Err(ActionError::NoTargets);
        }
        Ok(())
    }

    fn prep(&mut self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        prep_ap(ent, self.def.ap)?;
        self.targets = self.candidates(ent, game);
        if self.targets.is_empty() {
            return Err(ActionError::NoTargets);
        }
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
        let object = game
            .entity_at(*pos)
            .map(|e| InteractTarget::Entity(e.id))
            .filter(|t| self.targets.contains(t));
        let door = game
            .floor()
            .door_at(*pos)
            .map(|(room, door)| InteractTarget::Door { room, door })
            .filter(|t| self.targets.contains(t));
        match object.or(door) {
            Some(target) => {
                InputOutcome::commit(ActionExec::new(ent.id, index, InteractExec { target }))
            }
            None => InputOutcome::ignored(),
        }
    }

    fn validate(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec> {
        let ExecPayload::Interact(interact) = &exec.payload else {
            return Err(mismatch("Interact", exec));
        };
        let ent = actor(game, exec)?;
        require_ap(ent, self.def.ap)?;
        if self.candidates(ent, game).contains(&interact.target) {
            return Ok(());
        }
        Err(match interact.target {
            InteractTarget::Entity(id) => InvalidExec::InvalidTarget(id),
            InteractTarget::Door { .. } => InvalidExec::OutOfRange(ent.pos),
        })
    }

    fn maintain(&self, _dt: f64, game: &mut Game, run: &mut ExecRun) -> MaintainStatus {
        let ExecPayload::Interact(interact) = &run.exec.payload else {
            return MaintainStatus::Complete;
        };
        let id = run.exec.ent;
        pay(game, &run.exec, self.def.ap, false);
        game.push_event(GameEvent::Sprite {
            ent: id,
            command: SpriteCommand::Interact,
        });
        play_sound(game, &self.def.sounds, "interact", id);
        match interact.target {
            InteractTarget::Door { room, door } => {
                let opened = game.toggle_door(room, door);
                debug!(target: "core::exec", entity = %id, room, door, ?opened, "door toggled");
            }
            InteractTarget::Entity(object) => {
                if let Some(o) = game.entity_mut(object) {
                    o.flags.insert(EntityFlags::USED);
                }
                debug!(target: "core::exec", entity = %id, %object, "object used");
            }
        }
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
            "Range": self.def.range,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::GameEngine;
    use crate::entity::{EntityDef, EntityId, ObjectDef};
    use crate::geom::{BoardPos, BoardRect};
    use crate::state::tests::{spawn, test_game, test_registries};

    const OPEN: usize = 2;
    const DOOR: InteractTarget = InteractTarget::Door { room: 0, door: 0 };

    fn door_opened(game: &Game) -> bool {
        game.floor().rooms[0].doors[0].is_opened()
    }

    fn use_on(ent: EntityId, target: InteractTarget) -> ActionExec {
        ActionExec::new(ent, OPEN, InteractExec { target })
    }

    #[test]
    fn door_toggles_for_one_ap_each() {
        let mut game = test_game();
        let id = spawn(&mut game, "Occultist", 5, 2);
        let hall = BoardRect::cell(BoardPos::new(5, 6));
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();

        engine.prep_action(id, OPEN).unwrap();
        engine.run_to_completion(use_on(id, DOOR)).unwrap();
        assert!(door_opened(engine.game()));
        assert!(engine.game().has_los(id, &hall));

        engine.run_to_completion(use_on(id, DOOR)).unwrap();
        assert!(!door_opened(&game));
        assert!(!game.has_los(id, &hall));
        assert_eq!(game.entity(id).unwrap().stats.ap_cur(), 10 - 2);
        assert_eq!(game.exec_log().len(), 2);
    }

    #[test]
    fn door_out_of_reach_is_rejected() {
        let mut game = test_game();
        let id = spawn(&mut game, "Occultist", 1, 1);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();

        assert_eq!(
            engine.prep_action(id, OPEN),
            Err(ActionError::NoTargets)
        );
        assert_eq!(
            engine.begin(use_on(id, DOOR)),
            Err(InvalidExec::OutOfRange(BoardPos::new(1, 1)))
        );
        assert!(!door_opened(&game));
        assert_eq!(game.entity(id).unwrap().stats.ap_cur(), 10);
    }

    #[test]
    fn objects_are_used_once() {
        let mut registries = test_registries();
        let mut candle = EntityDef::new("Candle");
        candle.object = Some(ObjectDef::default());
        registries.add_entity(candle);
        let mut game = test_game();
        game.attach_registries(Arc::new(registries));

        let id = spawn(&mut game, "Occultist", 2, 2);
        let near = spawn(&mut game, "Candle", 3, 2);
        let far = spawn(&mut game, "Candle", 7, 2);
        let friend = spawn(&mut game, "Medium", 2, 1);
        let mut engine = GameEngine::new(&mut game);
        engine.begin_side_turn();

        for target in [far, friend] {
            assert_eq!(
                engine.begin(use_on(id, InteractTarget::Entity(target))),
                Err(InvalidExec::InvalidTarget(target))
            );
        }
        engine
            .run_to_completion(use_on(id, InteractTarget::Entity(near)))
            .unwrap();
        assert!(
            engine
                .game()
                .entity(near)
                .unwrap()
                .flags
                .contains(EntityFlags::USED)
        );
        assert_eq!(
            engine.begin(use_on(id, InteractTarget::Entity(near))),
            Err(InvalidExec::InvalidTarget(near))
        );
        assert_eq!(game.entity(id).unwrap().stats.ap_cur(), 10 - 1);
        assert!(!game.entity(far).unwrap().flags.contains(EntityFlags::USED));
    }
}
