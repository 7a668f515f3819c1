//! Scenario scripting.
//!
//! A scenario is a rhai script with optional `Init`, `RoundStart`, `OnMove`,
//! `OnAction` and `RoundEnd` functions. Each runs with `this` bound to the
//! script's store, a map that is saved and restored with the game.

mod bridge;
mod convert;
mod error;
mod host;
mod saved;

pub use bridge::{Callback, ScriptBridge, ScriptPoll};
pub use error::ScriptError;
pub use host::{HostContext, HostEffects, HostReply, HostRequest};
pub use saved::{decode_saved, encode_saved};

pub(crate) use convert::{RhaiResult, ent, pos, side, to_dyn};
pub(crate) use host::ent_summary;
