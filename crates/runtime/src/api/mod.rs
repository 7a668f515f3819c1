//! Public runtime API surface.
//!
//! Types exposed to hosts embedding the runtime: the error type and the
//! UI and audio collaborators.

pub mod errors;
pub mod host;

pub use errors::{Result, RuntimeError};
pub use host::{Audio, HeadlessAudio, HeadlessUi, PlacementRequest, Ui};
