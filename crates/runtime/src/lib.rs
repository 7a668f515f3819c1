//! Runtime orchestration for haunted-house skirmishes.
//!
//! This crate wires the deterministic core to everything that is not
//! deterministic: the scenario script and its thread, AI bindings, the
//! networked peer, saved games and the host's UI and audio. Consumers embed
//! [`Runtime`], feed it player input and frames, and subscribe to events.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the error type and host collaborators
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`script`] runs scenario callbacks and serves their host calls
//! - [`ai`] binds scripted, networked or absent AIs to sides and entities
//! - [`net`] and [`repository`] sync turns with a peer and keep saves
pub mod ai;
pub mod api;
pub mod events;
pub mod net;
pub mod repository;
pub mod runtime;
pub mod script;

mod turn;

#[cfg(test)]
mod fixtures;

pub use ai::{Ai, AiPoll, AiSet, AiTarget, InactiveAi, NetAi, ScriptedAi};
pub use api::{Audio, HeadlessAudio, HeadlessUi, PlacementRequest, Result, RuntimeError, Ui};
pub use events::{Event, EventBus, NetEvent, Topic, TurnEvent};
pub use net::{
    LocalServer, NetClient, NetError, NetId, NetIdStore, NetSession, NetTransport, TurnUpdate,
};
pub use repository::{
    FileSaveRepository, InMemorySaveRepository, RepositoryError, SaveRepository,
};
pub use runtime::{FrameStatus, PlayerInput, QUICK_SLOT, Runtime, RuntimeBuilder, RuntimeConfig};
pub use script::{Callback, ScriptBridge, ScriptError, decode_saved, encode_saved};
