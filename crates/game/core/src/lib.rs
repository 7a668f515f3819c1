//! Deterministic rules of a turn-based haunted-house skirmish.
//!
//! `haunts-core` owns everything two peers must agree on: the house model,
//! line of sight, entities and their stats, the action variants and their
//! exec encoding, turn bookkeeping and the seeded PRNG. It performs no I/O.
//! All state mutation flows through [`engine::GameEngine`]; the frame driver,
//! scripting and networking live in `haunts-runtime`.
pub mod action;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod events;
pub mod geom;
pub mod house;
pub mod input;
pub mod los;
pub mod registry;
pub mod replay;
pub mod rng;
pub mod state;
pub mod stats;

pub use action::{
    Action, ActionBehavior, ActionDef, ActionError, ActionExec, AoeExec, AttackExec,
    EncodedExec, ExecCodecError, ExecPayload, ExecRegistry, InputOutcome, InteractExec,
    InteractTarget, InvalidExec, MaintainStatus, MoveExec, ReadyExec, SummonExec,
};
pub use config::GameConfig;
pub use engine::{ActionState, GameEngine, TurnState, side_for_turn};
pub use entity::{Entity, EntityDef, EntityFlags, EntityId, GearDef, Side};
pub use error::{ErrorSeverity, GameError};
pub use events::{GameEvent, MusicCommand, SpriteCommand};
pub use geom::{BoardPos, BoardRect};
pub use house::{Floor, House, HouseDef, RoomDef, SpatialError, SpawnPoint};
pub use input::{InputEvent, KeyMap};
pub use los::{LosData, LosMode, SideLos};
pub use registry::Registries;
pub use replay::{ReplayReport, replay_encoded, replay_execs};
pub use rng::GameRng;
pub use state::{Game, NetInfo, SaveError, Waypoint};
pub use stats::{BaseStats, ConditionDef, DamageKind, Stats};
