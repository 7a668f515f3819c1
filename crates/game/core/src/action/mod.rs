//! Actions: what an entity can do with its AP.
//!
//! Each entity carries a list of [`Action`]s built from its definition. The
//! lifecycle of one use is:
//!
//! 1. `preppable` / `prep` against the selected entity,
//! 2. `handle_input` until the player commits an [`ActionExec`],
//! 3. `validate` when the exec is begun (also at replay time),
//! 4. `maintain` every frame until it reports [`MaintainStatus::Complete`].
//!
//! Everything `maintain` does is a function of the game state and the exec,
//! so the same exec applied to the same state always ends in the same state.

mod def;
mod error;
mod exec;
pub mod kinds;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use def::{ActionDef, AoeAttackDef, BasicAttackDef, InteractDef, MoveDef, SummonDef};
pub use error::{ActionError, ExecCodecError, InvalidExec};
pub use exec::{
    ActionExec, AoeExec, AttackExec, EncodedExec, ExecPayload, ExecRegistry, InteractExec,
    InteractTarget, MoveExec, ReadyExec, SummonExec,
};
pub use kinds::{AoeAction, AttackAction, HitOutcome, InteractAction, MoveAction, SummonAction};

use crate::entity::Entity;
use crate::events::{GameEvent, SpriteCommand};
use crate::input::InputEvent;
use crate::state::Game;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaintainStatus {
    InProgress,
    Complete,
    /// The action reached a point where readied actions may fire.
    CheckForInterrupts,
}

/// Result of feeding one input event to the prepped action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputOutcome {
    pub consumed: bool,
    pub exec: Option<ActionExec>,
}

impl InputOutcome {
    pub fn ignored() -> Self {
        Self::default()
    }

    pub fn consumed() -> Self {
        Self {
            consumed: true,
            exec: None,
        }
    }

    pub fn commit(exec: ActionExec) -> Self {
        Self {
            consumed: true,
            exec: Some(exec),
        }
    }
}

/// Progress of an exec between `maintain` calls.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecRun {
    pub exec: ActionExec,
    /// Fraction of the current step walked.
    pub progress: f64,
    /// Steps completed.
    pub step: usize,
    pub started: bool,
    pub interrupted: bool,
    /// `maintain` calls so far.
    pub calls: u32,
}

impl ExecRun {
    pub fn new(exec: ActionExec) -> Self {
        Self {
            exec,
            progress: 0.0,
            step: 0,
            started: false,
            interrupted: false,
            calls: 0,
        }
    }
}

/// Behaviour every action variant implements.
pub trait ActionBehavior {
    fn name(&self) -> &str;

    /// AP paid when the action is performed.
    fn ap(&self) -> i32;

    fn readyable(&self) -> bool {
        false
    }

    fn preppable(&self, ent: &Entity, game: &Game) -> Result<(), ActionError>;

    /// Caches whatever input handling needs (reachable cells, targets).
    fn prep(&mut self, ent: &Entity, game: &Game) -> Result<(), ActionError>;

    fn handle_input(
        &mut self,
        ent: &Entity,
        index: usize,
        input: &InputEvent,
        game: &Game,
    ) -> InputOutcome;

    /// Kind-specific checks of an exec against the current state.
    fn validate(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec>;

    fn maintain(&self, dt: f64, game: &mut Game, run: &mut ExecRun) -> MaintainStatus;

    /// Asks a running exec to stop at its next safe point. Returns whether it
    /// will.
    fn interrupt(&self, run: &mut ExecRun) -> bool {
        run.interrupted = true;
        true
    }

    /// Drops prep state.
    fn cancel(&mut self);

    fn sound_map(&self) -> &BTreeMap<String, String>;

    /// Script-facing description.
    fn push(&self) -> serde_json::Value;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Move(MoveAction),
    BasicAttack(AttackAction),
    AoeAttack(AoeAction),
    Interact(InteractAction),
    Summon(SummonAction),
}

macro_rules! dispatch {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            Action::Move($a) => $body,
            Action::BasicAttack($a) => $body,
            Action::AoeAttack($a) => $body,
            Action::Interact($a) => $body,
            Action::Summon($a) => $body,
        }
    };
}

impl Action {
    pub fn from_def(def: ActionDef) -> Self {
        match def {
            ActionDef::Move(d) => Self::Move(MoveAction::new(d)),
            ActionDef::BasicAttack(d) => Self::BasicAttack(AttackAction::new(d)),
            ActionDef::AoeAttack(d) => Self::AoeAttack(AoeAction::new(d)),
            ActionDef::Interact(d) => Self::Interact(InteractAction::new(d)),
            ActionDef::Summon(d) => Self::Summon(SummonAction::new(d)),
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Move(_) => "Move",
            Self::BasicAttack(_) => "BasicAttack",
            Self::AoeAttack(_) => "AoeAttack",
            Self::Interact(_) => "Interact",
            Self::Summon(_) => "Summon",
        }
    }

    /// Uses left, `None` when unlimited.
    pub fn ammo(&self) -> Option<i32> {
        match self {
            Self::BasicAttack(a) => a.ammo(),
            Self::AoeAttack(a) => a.ammo(),
            Self::Summon(a) => a.ammo(),
            _ => None,
        }
    }

    pub(crate) fn consume_ammo(&mut self) {
        match self {
            Self::BasicAttack(a) => a.consume_ammo(),
            Self::AoeAttack(a) => a.consume_ammo(),
            Self::Summon(a) => a.consume_ammo(),
            _ => {}
        }
    }

    fn validate_ready(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec> {
        if !self.readyable() {
            return Err(InvalidExec::NotReadyable);
        }
        let ent = game
            .entity(exec.ent)
            .ok_or(InvalidExec::EntityGone(exec.ent))?;
        kinds::require_ap(ent, self.ap())?;
        if self.ammo() == Some(0) {
            return Err(InvalidExec::OutOfAmmo);
        }
        Ok(())
    }

    /// Readying pays the AP now and leaves the action armed on the entity.
    fn maintain_ready(&self, game: &mut Game, run: &ExecRun) -> MaintainStatus {
        let ap = self.ap();
        if let Some(ent) = game.entity_mut(run.exec.ent) {
            ent.stats.spend_ap(ap);
            ent.ready = Some(run.exec.index);
        }
        debug!(target: "core::exec", entity = %run.exec.ent, action = self.name(), "readied");
        game.push_event(GameEvent::Sprite {
            ent: run.exec.ent,
            command: SpriteCommand::Ready,
        });
        MaintainStatus::Complete
    }
}

impl ActionBehavior for Action {
    fn name(&self) -> &str {
        dispatch!(self, a => a.name())
    }

    fn ap(&self) -> i32 {
        dispatch!(self, a => a.ap())
    }

    fn readyable(&self) -> bool {
        dispatch!(self, a => a.readyable())
    }

    fn preppable(&self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        dispatch!(self, a => a.preppable(ent, game))
    }

    fn prep(&mut self, ent: &Entity, game: &Game) -> Result<(), ActionError> {
        dispatch!(self, a => a.prep(ent, game))
    }

    fn handle_input(
        &mut self,
        ent: &Entity,
        index: usize,
        input: &InputEvent,
        game: &Game,
    ) -> InputOutcome {
        if *input == InputEvent::Ready {
            if !self.readyable() {
                return InputOutcome::ignored();
            }
            return InputOutcome::commit(ActionExec::new(ent.id, index, ReadyExec));
        }
        dispatch!(self, a => a.handle_input(ent, index, input, game))
    }

    fn validate(&self, exec: &ActionExec, game: &Game) -> Result<(), InvalidExec> {
        if let ExecPayload::Ready(_) = exec.payload {
            return self.validate_ready(exec, game);
        }
        dispatch!(self, a => a.validate(exec, game))
    }

    fn maintain(&self, dt: f64, game: &mut Game, run: &mut ExecRun) -> MaintainStatus {
        run.calls += 1;
        if let ExecPayload::Ready(_) = run.exec.payload {
            return self.maintain_ready(game, run);
        }
        dispatch!(self, a => a.maintain(dt, game, run))
    }

    fn interrupt(&self, run: &mut ExecRun) -> bool {
        dispatch!(self, a => a.interrupt(run))
    }

    fn cancel(&mut self) {
        dispatch!(self, a => a.cancel())
    }

    fn sound_map(&self) -> &BTreeMap<String, String> {
        dispatch!(self, a => a.sound_map())
    }

    fn push(&self) -> serde_json::Value {
        let mut value = dispatch!(self, a => a.push());
        if let Some(table) = value.as_object_mut() {
            table.insert("Kind".into(), self.kind().into());
            table.insert("Readyable".into(), self.readyable().into());
        }
        value
    }
}
