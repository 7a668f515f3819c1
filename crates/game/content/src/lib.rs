//! Data-driven content definitions and loaders.
//!
//! This crate reads everything the game keeps on disk:
//! - House, room, entity, condition and gear documents (JSON, keyed by `Name`)
//! - Game configuration (TOML)
//! - Scenario and AI scripts
//! - Player records
//!
//! Content is loaded once into [`haunts_core::Registries`] and never appears
//! in saved game state.

pub mod loaders;

pub use loaders::{
    ConfigLoader, ContentFactory, PlayerRecord, PlayerStore, RegistryLoader, ScriptLoader,
};
