//! Outbox of side effects the core asks its host to perform.
//!
//! The core never touches rendering or audio. Anything visible or audible is
//! queued as a [`GameEvent`] on the game and drained by the runtime once per
//! frame.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::ActionExec;
use crate::entity::{EntityId, Side};
use crate::geom::BoardPos;

/// Commands for an entity's sprite state machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpriteCommand {
    Turn(u8),
    Move(BoardPos),
    Attack,
    Defend,
    Damaged,
    Killed,
    Summon,
    Ready,
    Interact,
    /// Named animation requested by a script.
    Play(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MusicCommand {
    Play(String),
    Stop,
    Param { name: String, value: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Sprite {
        ent: EntityId,
        command: SpriteCommand,
    },
    Sound {
        name: String,
        ent: Option<EntityId>,
    },
    Music(MusicCommand),
    /// Immutable snapshot of a side's LOS texture after a remap.
    LosTexture {
        side: Side,
        alpha: Arc<[u8]>,
    },
    WaypointsChanged,
    ExecCommitted(ActionExec),
    EntitySpawned(EntityId),
    EntityRemoved(EntityId),
    DoorToggled {
        room: usize,
        door: usize,
        opened: bool,
    },
    ViewerRebuilt,
    GameEnded,
}
